use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use log::info;

use crate::App;
use crate::ops::github::GithubOps;
use crate::ops::github::NewRelease;
use crate::types::RepoId;

/// Pause after each created release so bulk syncs stay under secondary rate limits.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

impl<G, H: GithubOps> App<G, H> {
    /// Create on `dest` every release of `src` whose tag `dest` lacks.
    ///
    /// Only tag, name and notes are copied; assets are not. Returns the number
    /// of releases created.
    pub async fn cmd_sync_releases(
        &self,
        src: &RepoId,
        dest: &RepoId,
        interval: Duration,
        stdout: &mut impl std::io::Write,
    ) -> Result<usize> {
        info!("Importing GitHub releases from {} to {}", src, dest);
        let (src_releases, dest_releases) = futures_util::try_join!(
            async {
                self.gh
                    .list_releases(src)
                    .await
                    .with_context(|| format!("Failed to list releases of {}", src))
            },
            async {
                self.gh
                    .list_releases(dest)
                    .await
                    .with_context(|| format!("Failed to list releases of {}", dest))
            },
        )?;
        info!("Found {} releases on {}", src_releases.len(), src);

        let synced: HashSet<&str> = dest_releases.iter().map(|r| r.tag_name.as_str()).collect();
        let mut created = 0;
        // GitHub lists newest first; create oldest first so dest lists the same order
        for release in src_releases.iter().rev() {
            if synced.contains(release.tag_name.as_str()) {
                info!("{} is already synced", release.tag_name);
                continue;
            }

            info!("Syncing {}", release.tag_name);
            let new_release = NewRelease {
                tag_name: release.tag_name.clone(),
                name: release.tag_name.clone(),
                body: release.body.clone().unwrap_or_default(),
                draft: false,
                prerelease: false,
            };
            self.gh
                .create_release(dest, &new_release)
                .await
                .with_context(|| format!("Failed to create release {}", release.tag_name))?;
            created += 1;

            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }

        writeln!(stdout, "Synced {} releases", created)?;
        Ok(created)
    }
}
