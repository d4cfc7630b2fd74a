//! SteamCMD invocation arguments.
//!
//! Builders for the argument lists the runner feeds to SteamCMD. The
//! executable path is resolved per platform beneath the tool's base
//! directory; callers pick the verb (install/update a server build,
//! download a workshop item).

use std::path::{Path, PathBuf};

/// Locate the SteamCMD entry point under its install directory.
pub fn steamcmd_executable(base: &Path) -> PathBuf {
    if cfg!(windows) {
        base.join("steamcmd.exe")
    } else {
        base.join("steamcmd.sh")
    }
}

/// Release branch selection for `app_update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Branch {
    #[default]
    Stable,
    Beta {
        /// Password for a protected beta branch, if required.
        password: Option<String>,
    },
}

/// Arguments for installing or updating a dedicated-server build into
/// `install_dir`.
pub fn app_update_args(
    install_dir: &Path,
    app_id: &str,
    branch: &Branch,
    validate: bool,
) -> Vec<String> {
    let mut args = vec![
        "+login".to_string(),
        "anonymous".to_string(),
        "+force_install_dir".to_string(),
        quote_install_dir(install_dir),
        "+app_update".to_string(),
        app_id.to_string(),
    ];
    if let Branch::Beta { password } = branch {
        args.push("-beta".to_string());
        args.push("beta".to_string());
        if let Some(password) = password {
            args.push("-betapassword".to_string());
            args.push(password.clone());
        }
    }
    if validate {
        args.push("validate".to_string());
    }
    args.push("+quit".to_string());
    args
}

/// Arguments for downloading a single workshop item.
pub fn workshop_item_args(app_id: &str, item_id: &str) -> Vec<String> {
    vec![
        "+login".to_string(),
        "anonymous".to_string(),
        "+workshop_download_item".to_string(),
        app_id.to_string(),
        item_id.to_string(),
        "validate".to_string(),
        "+quit".to_string(),
    ]
}

/// SteamCMD needs the install dir quoted when the path contains spaces.
fn quote_install_dir(path: &Path) -> String {
    format!("\"{}\"", path.display())
}
