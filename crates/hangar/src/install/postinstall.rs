//! Parsing the `postinstall` script of an expanded macOS package

use std::path::Path;

use crate::error::{FileOperation, HangarError, Result};

const BUNDLE_NAME_PREFIX: &str = "gog_bundle_name=";
const INSTALLER_TYPE_PREFIX: &str = "gog_installer_type=";

/// Boilerplate shared by every package script; anything else is a custom command
const KNOWN_LINES: &[&str] = &[
    "#!/bin/bash",
    "#!/bin/sh",
    "set -e",
    "exit 0",
    "fi",
    "then",
    "else",
    "done",
    "PKG_PATH=\"$1\"",
    "TARGET_PATH=\"$2\"",
    "gog_full_path=\"$2/$gog_bundle_name\"",
    "if [ \"$gog_installer_type\" = \"game\" ]; then",
    "if [ \"$gog_installer_type\" = \"dlc\" ]; then",
    "mkdir -p \"$gog_full_path\"",
    "cp -R \"$PKG_PATH/Contents/Resources/payload/\" \"$gog_full_path\"",
    "ditto \"$(dirname \"$0\")/payload\" \"$gog_full_path\"",
    "chown -R \"$USER\":staff \"$gog_full_path\"",
    "chmod -R 755 \"$gog_full_path\"",
    "xattr -r -d com.apple.quarantine \"$gog_full_path\"",
];

pub const GAME_INSTALLER_TYPE: &str = "game";
pub const DLC_INSTALLER_TYPE: &str = "dlc";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostInstallScript {
    pub bundle_name: Option<String>,
    pub installer_type: Option<String>,
    pub custom_commands: Vec<String>,
}

impl PostInstallScript {
    pub fn parse(script: &str) -> Self {
        let mut parsed = Self::default();
        for line in script.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            if let Some(value) = line.strip_prefix(BUNDLE_NAME_PREFIX) {
                parsed.bundle_name = Some(value.trim_matches('"').to_string()).filter(|v| !v.is_empty());
            } else if let Some(value) = line.strip_prefix(INSTALLER_TYPE_PREFIX) {
                parsed.installer_type = Some(value.trim_matches('"').to_string()).filter(|v| !v.is_empty());
            } else if !line.starts_with('#') && !KNOWN_LINES.contains(&line) {
                parsed.custom_commands.push(line.to_string());
            }
        }
        parsed
    }

    pub fn load(path: &Path) -> Result<Self> {
        let script = std::fs::read_to_string(path).map_err(|e| HangarError::fs(path, FileOperation::Read, e))?;
        Ok(Self::parse(&script))
    }

    pub fn is_dlc(&self) -> bool {
        self.installer_type.as_deref() == Some(DLC_INSTALLER_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bundle_name_type_and_custom_commands() {
        let script = r#"#!/bin/bash
# GOG.com (www.gog.com)
gog_bundle_name="Some Game.app"
gog_installer_type="game"

gog_full_path="$2/$gog_bundle_name"
mkdir -p "$gog_full_path"
defaults write com.somegame.plist FirstRun -bool NO
exit 0
"#;
        let parsed = PostInstallScript::parse(script);
        assert_eq!(parsed.bundle_name.as_deref(), Some("Some Game.app"));
        assert_eq!(parsed.installer_type.as_deref(), Some(GAME_INSTALLER_TYPE));
        assert!(!parsed.is_dlc());
        assert_eq!(parsed.custom_commands, vec!["defaults write com.somegame.plist FirstRun -bool NO".to_string()]);
    }

    #[test]
    fn missing_fields_stay_empty() {
        let parsed = PostInstallScript::parse("gog_bundle_name=\"\"\ngog_installer_type=dlc\n");
        assert_eq!(parsed.bundle_name, None);
        assert!(parsed.is_dlc());
        assert!(parsed.custom_commands.is_empty());
    }
}
