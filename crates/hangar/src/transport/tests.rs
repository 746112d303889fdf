use super::*;
use crate::error::{FileOperation, HangarError};
use crate::progress::ProgressEvent;
use crate::testing::{ProgressCapture, server_for};
use tempfile::tempdir;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[cfg(test)]
mod http_transport_tests {
    use super::*;

    #[tokio::test]
    async fn downloads_file_and_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/files"))
            .and(query_param("manual-url", "/downloads/game/en1installer0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"installer bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let capture = ProgressCapture::new();
        let transport = HttpTransport::new(reqwest::Client::new());
        let url = format!("{}/api/files?manual-url=/downloads/game/en1installer0", server.uri());

        let outcome = transport
            .download(&url, dir.path(), "setup_game.exe", false, Some(capture.callback()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DownloadOutcome::Downloaded {
                path: dir.path().join("setup_game.exe"),
                size: 15
            }
        );
        assert_eq!(std::fs::read(dir.path().join("setup_game.exe")).unwrap(), b"installer bytes");
        assert!(!dir.path().join("setup_game.exe.part").exists());

        let events = capture.events();
        assert!(matches!(events.first(), Some(ProgressEvent::DownloadStarted { .. })));
        assert!(matches!(events.last(), Some(ProgressEvent::DownloadComplete { final_size: 15, .. })));
    }

    #[tokio::test]
    async fn existing_file_is_kept_unless_forced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("f.bin"), b"stale").unwrap();
        let transport = HttpTransport::new(reqwest::Client::new());
        let url = format!("{}/file", server.uri());

        let outcome = transport.download(&url, dir.path(), "f.bin", false, None).await.unwrap();
        assert!(matches!(outcome, DownloadOutcome::AlreadyExists { size: 5, .. }));
        assert_eq!(std::fs::read(dir.path().join("f.bin")).unwrap(), b"stale");

        transport.download(&url, dir.path(), "f.bin", true, None).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("f.bin")).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let transport = HttpTransport::new(reqwest::Client::new());
        let err = transport
            .download(&format!("{}/missing", server.uri()), dir.path(), "m.bin", false, None)
            .await
            .unwrap_err();

        assert!(matches!(err, HangarError::HttpStatus { status: 404, .. }));
        assert!(!err.is_recoverable());
        assert!(!dir.path().join("m.bin").exists());
    }

    #[tokio::test]
    async fn server_requests_carry_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/files"))
            .and(basic_auth("operator", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let mut connection = server_for(&server);
        connection.username = Some("operator".to_string());
        connection.password = Some("secret".to_string());

        let dir = tempdir().unwrap();
        let transport = HttpTransport::new(reqwest::Client::new()).with_server(connection);
        transport
            .download(&format!("{}/api/files", server.uri()), dir.path(), "a.bin", false, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn partial_download_resumes_with_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .and(wiremock::matchers::header("Range", "bytes=5-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b" world".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("big.bin.part"), b"hello").unwrap();
        let transport = HttpTransport::new(reqwest::Client::new());

        let outcome = transport
            .download(&format!("{}/big", server.uri()), dir.path(), "big.bin", false, None)
            .await
            .unwrap();

        assert!(matches!(outcome, DownloadOutcome::Downloaded { size: 11, .. }));
        assert_eq!(std::fs::read(dir.path().join("big.bin")).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn forced_download_discards_partial_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .and(wiremock::matchers::header("Range", "bytes=5-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b" world".to_vec()))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("big.bin.part"), b"stale").unwrap();
        let transport = HttpTransport::new(reqwest::Client::new());

        transport
            .download(&format!("{}/big", server.uri()), dir.path(), "big.bin", true, None)
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("big.bin")).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn undeletable_partial_fails_forced_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        // A directory in place of the partial file cannot be removed as a file
        std::fs::create_dir(dir.path().join("big.bin.part")).unwrap();
        let transport = HttpTransport::new(reqwest::Client::new());

        let err = transport
            .download(&format!("{}/big", server.uri()), dir.path(), "big.bin", true, None)
            .await
            .unwrap_err();

        assert!(matches!(err, HangarError::FileSystem { operation: FileOperation::Delete, .. }));
        assert!(!dir.path().join("big.bin").exists());
    }
}
