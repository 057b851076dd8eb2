//! Mirror the media library into the public directory

use anyhow::Result;

use crate::media::{MediaSync, SyncMode};
use crate::Site;

/// Run the sync-media command
pub fn run(site: &Site, symlink: bool, clean: bool) -> Result<()> {
    let mode = if symlink {
        SyncMode::Symlink
    } else {
        SyncMode::Copy
    };

    let report = MediaSync::for_site(site)?.mode(mode).clean(clean).run()?;

    println!(
        "Media synced: {} copied, {} linked, {} unchanged, {} removed",
        report.copied, report.linked, report.skipped, report.removed
    );
    Ok(())
}
