//! Steam non-Steam-game shortcuts for installed products
//!
//! Entries are keyed by an application id derived from the launcher
//! executable and the product title, so re-syncing finds the same entry.

pub mod steam;

use std::path::{Path, PathBuf};
use steam_shortcuts_util::Shortcut as SteamShortcut;
use steam_shortcuts_util::app_id_generator::calculate_app_id;
use steam_shortcuts_util::shortcut::ShortcutOwned;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::model::{OperatingSystem, ProductImages, os_lang_code};
use crate::progress::ProgressEvent;
use crate::state::parameters::InstallParameters;
use crate::store::property;

pub use steam::SteamLibrary;

/// Steam's id for a non-Steam shortcut of `exe` named `title`
pub fn shortcut_app_id(exe: &str, title: &str) -> u32 {
    calculate_app_id(exe, title)
}

/// Launch options that make the shortcut run `id` through hangar
pub fn launch_options(id: &str, lang_code: &str) -> String {
    format!("run {} --lang-code {}", id, lang_code)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub app_id: u32,
    pub app_name: String,
    pub exe: PathBuf,
    pub start_dir: PathBuf,
    pub icon: PathBuf,
    pub launch_options: String,
}

impl Shortcut {
    pub fn new(exe: &Path, title: &str, start_dir: &Path, icon: &Path, launch_options: String) -> Self {
        Self {
            app_id: shortcut_app_id(&exe.display().to_string(), title),
            app_name: title.to_string(),
            exe: exe.to_path_buf(),
            start_dir: start_dir.to_path_buf(),
            icon: icon.to_path_buf(),
            launch_options,
        }
    }

    /// A new entry with Steam's defaults for the fields hangar does not manage
    pub fn to_entry(&self, order: usize) -> ShortcutOwned {
        let order = order.to_string();
        let exe = quote(&self.exe);
        let start_dir = quote(&self.start_dir);
        let icon = self.icon.display().to_string();

        SteamShortcut {
            order: &order,
            app_id: self.app_id,
            app_name: &self.app_name,
            exe: &exe,
            start_dir: &start_dir,
            icon: &icon,
            shortcut_path: "",
            launch_options: &self.launch_options,
            is_hidden: false,
            allow_desktop_config: true,
            allow_overlay: true,
            open_vr: 0,
            dev_kit: 0,
            dev_kit_game_id: "",
            dev_kit_overrite_app_id: 0,
            last_play_time: 0,
            tags: Vec::new(),
        }
        .to_owned()
    }

    /// Overwrite the managed fields of `entry`; true when any of them differed
    fn apply(&self, entry: &mut ShortcutOwned) -> bool {
        let fields = [
            (&mut entry.app_name, self.app_name.clone()),
            (&mut entry.exe, quote(&self.exe)),
            (&mut entry.start_dir, quote(&self.start_dir)),
            (&mut entry.icon, self.icon.display().to_string()),
            (&mut entry.launch_options, self.launch_options.clone()),
        ];

        let mut changed = false;
        for (field, value) in fields {
            if *field != value {
                *field = value;
                changed = true;
            }
        }
        changed
    }
}

fn quote(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Appended,
    Updated,
    /// Present and not forced, or forced with identical fields
    Unchanged,
}

impl UpsertOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

/// Position of the entry with `app_id`
pub fn find(entries: &[ShortcutOwned], app_id: u32) -> Option<usize> {
    entries.iter().position(|entry| entry.app_id == app_id)
}

/// Add `shortcut` to the entries or, when `force`, refresh it in place
pub fn upsert(entries: &mut Vec<ShortcutOwned>, shortcut: &Shortcut, force: bool) -> UpsertOutcome {
    match find(entries, shortcut.app_id) {
        Some(_) if !force => UpsertOutcome::Unchanged,
        Some(index) => {
            if shortcut.apply(&mut entries[index]) {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Unchanged
            }
        }
        None => {
            entries.push(shortcut.to_entry(entries.len()));
            UpsertOutcome::Appended
        }
    }
}

/// Drop the entry with `app_id`, renumbering the rest from zero
pub fn remove(entries: &mut Vec<ShortcutOwned>, app_id: u32) -> bool {
    let before = entries.len();
    entries.retain(|entry| entry.app_id != app_id);
    renumber(entries);
    entries.len() != before
}

/// Steam keys entries by their position
pub fn renumber(entries: &mut [ShortcutOwned]) {
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.order = index.to_string();
    }
}

/// Artwork slots of the Steam library grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridImage {
    Image,
    Vertical,
    Hero,
    Logo,
    Icon,
}

impl GridImage {
    pub fn filename(&self, app_id: u32) -> String {
        match self {
            GridImage::Image => format!("{}.png", app_id),
            GridImage::Vertical => format!("{}p.png", app_id),
            GridImage::Hero => format!("{}_hero.png", app_id),
            GridImage::Logo => format!("{}_logo.png", app_id),
            GridImage::Icon => format!("{}_icon.png", app_id),
        }
    }
}

/// Image id for every slot the product has artwork for
///
/// Hero falls back to the background, the icon to the plain icon.
pub fn grid_images(images: &ProductImages) -> Vec<(GridImage, String)> {
    let pick = |primary: &Option<String>, fallback: Option<&Option<String>>| {
        primary
            .iter()
            .chain(fallback.into_iter().flatten())
            .find(|id| !id.is_empty())
            .cloned()
    };

    [
        (GridImage::Image, pick(&images.image, None)),
        (GridImage::Vertical, pick(&images.vertical_image, None)),
        (GridImage::Hero, pick(&images.hero, Some(&images.background))),
        (GridImage::Logo, pick(&images.logo, None)),
        (GridImage::Icon, pick(&images.icon_square, Some(&images.icon))),
    ]
    .into_iter()
    .filter_map(|(slot, id)| id.map(|id| (slot, id)))
    .collect()
}

/// Download artwork into `grid_dir`; failures are warnings. Returns the number downloaded.
pub async fn download_grid_images(
    ctx: &Context,
    grid_dir: &Path,
    app_id: u32,
    images: &ProductImages,
    force: bool,
) -> Result<usize> {
    let server = ctx.server()?;
    let mut downloaded = 0;

    for (slot, image_id) in grid_images(images) {
        let url = server.url("/api/image", &[("id", &image_id)])?;
        match ctx
            .transport
            .download(url.as_str(), grid_dir, &slot.filename(app_id), force, None)
            .await
        {
            Ok(_) => downloaded += 1,
            Err(e) => {
                let message = format!("failed to download {:?} image {}: {}", slot, image_id, e);
                warn!("{}", message);
                ctx.report(ProgressEvent::Warning { message });
            }
        }
    }

    Ok(downloaded)
}

fn steam_library(ctx: &Context) -> Result<SteamLibrary> {
    SteamLibrary::from_config(&ctx.config).ok_or_else(|| {
        HangarError::configuration("Steam directory not found", Some("Set HANGAR_STEAM_DIR to the Steam root"))
    })
}

fn pinned_title(ctx: &Context, id: &str) -> Result<String> {
    ctx.properties
        .get_last_value(property::TITLE, id)?
        .filter(|title| !title.is_empty())
        .ok_or_else(|| HangarError::MissingMetadata {
            id: id.to_string(),
            field: "title".to_string(),
        })
}

/// Add or refresh the shortcut of installed product `id` for every Steam user
///
/// `exe` is the hangar executable the shortcut launches. Returns the
/// outcome per account id.
pub async fn sync_shortcut(
    ctx: &Context,
    exe: &Path,
    id: &str,
    lang_code: &str,
    force: bool,
) -> Result<Vec<(u32, UpsertOutcome)>> {
    let library = steam_library(ctx)?;
    let title = pinned_title(ctx, id)?;

    let os = installed_os(ctx, id)?;
    let record = ctx
        .records
        .record(id, os, lang_code)?
        .ok_or_else(|| HangarError::NotInstalled {
            id: id.to_string(),
            os_lang: os_lang_code(os, lang_code),
        })?;
    let images = ctx.catalog.cached(id)?.map(|product| product.images).unwrap_or_default();

    let mut outcomes = Vec::new();
    for account in library.login_users()? {
        let app_id = shortcut_app_id(&exe.display().to_string(), &title);
        let grid_dir = library.grid_dir(account);
        let shortcut = Shortcut::new(
            exe,
            &title,
            &record.install_dir,
            &grid_dir.join(GridImage::Icon.filename(app_id)),
            launch_options(id, lang_code),
        );

        let mut entries = library.load_shortcuts(account)?;
        let outcome = upsert(&mut entries, &shortcut, force);
        match outcome {
            UpsertOutcome::Unchanged => info!("Shortcut for {} already exists for user {}", title, account),
            changed => {
                library.save_shortcuts(account, &mut entries)?;
                info!("{:?} shortcut for {} for user {}", changed, title, account);
            }
        }

        download_grid_images(ctx, &grid_dir, app_id, &images, force).await?;
        outcomes.push((account, outcome));
    }

    if outcomes.is_empty() {
        debug!("No Steam users found in {}", library.root().display());
    }
    Ok(outcomes)
}

/// Remove the shortcut and artwork of `id` for every Steam user
///
/// Returns the number of accounts a shortcut was removed from.
pub async fn remove_shortcut(ctx: &Context, exe: &Path, id: &str) -> Result<usize> {
    let library = steam_library(ctx)?;
    let title = pinned_title(ctx, id)?;
    let app_id = shortcut_app_id(&exe.display().to_string(), &title);

    let mut removed = 0;
    for account in library.login_users()? {
        let mut entries = library.load_shortcuts(account)?;
        if remove(&mut entries, app_id) {
            library.save_shortcuts(account, &mut entries)?;
            removed += 1;
            info!("Removed shortcut for {} for user {}", title, account);
        }

        let grid_dir = library.grid_dir(account);
        for slot in [
            GridImage::Image,
            GridImage::Vertical,
            GridImage::Hero,
            GridImage::Logo,
            GridImage::Icon,
        ] {
            let path = grid_dir.join(slot.filename(app_id));
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(removed)
}

/// Target OS `id` was installed for, the host when nothing is pinned
pub fn installed_os(ctx: &Context, id: &str) -> Result<OperatingSystem> {
    Ok(InstallParameters::load(&ctx.properties, id)?
        .map(|params| params.operating_system)
        .unwrap_or_else(|| ctx.host_os()))
}
