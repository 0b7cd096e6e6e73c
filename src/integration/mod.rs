//! Desktop integration around the update core.
//!
//! These are thin wrappers over the file system and the session. Apart from
//! [`preflight`] and [`launch`], their failures are warnings: a missing icon
//! or an unwritable `~/.profile` never fails an otherwise successful update.
//!
//! - [`preflight`] - platform check before anything is touched
//! - [`profile`] - software rendering switch in `~/.profile`
//! - [`icon`] - icon download with placeholder fallback
//! - [`desktop`] - freedesktop menu entry
//! - [`launch`] - starting the installed application detached

pub mod desktop;
pub mod icon;
pub mod launch;
pub mod preflight;
pub mod profile;
