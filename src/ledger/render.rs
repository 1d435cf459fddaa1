use tracing::info;

use super::{path_string, VersionLedger};
use crate::error::LedgerError;
use crate::host::HostScene;
use crate::models::*;
use crate::templates::{Fields, SEQ_KEY};
use crate::tracking::TrackingSystem;

const DEFAULT_CHANNEL: &str = "main";

impl<T: TrackingSystem, H: HostScene> VersionLedger<T, H> {
    /// Record a render submitted from `input.node` of work item `name`.
    ///
    /// The render takes the work item's current version. A node keeps its
    /// channel across versions; new nodes get the requested channel, or
    /// `main`, suffixed with a number when another node already uses it.
    /// Submitting the same node twice at one version returns the existing
    /// render.
    pub fn register_render(
        &mut self,
        name: &str,
        input: RegisterRenderInput,
    ) -> Result<RenderOutput, LedgerError> {
        let item = self.work_item(name)?;
        let existing = self.db.get_render_outputs(item.id)?;

        if let Some(render) = existing
            .iter()
            .find(|r| r.node == input.node && r.version == item.version)
        {
            return Ok(render.clone());
        }

        let channel = match existing.iter().find(|r| r.node == input.node) {
            Some(previous) => previous.channel.clone(),
            None => {
                let taken: Vec<&str> = existing.iter().map(|r| r.channel.as_str()).collect();
                let requested = input
                    .channel
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or(DEFAULT_CHANNEL);
                unique_channel(requested, &taken)
            }
        };

        let fields = Fields::new()
            .with("name", item.name.as_str())
            .with("channel", channel.as_str())
            .with("version", item.version.to_string())
            .with(SEQ_KEY, "%04d");
        let pattern = path_string(&self.templates.render.apply_fields(&fields)?);

        let render = self
            .db
            .create_render_output(item.id, item.version, &input, &channel, &pattern)?;
        info!(
            "Render {} of {} registered as {} v{:03}",
            render.node, item.name, render.channel, render.version
        );
        Ok(render)
    }
}

/// `base`, or `base1`, `base2`, ... for the first one not in `taken`.
fn unique_channel(base: &str, taken: &[&str]) -> String {
    if !taken.contains(&base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_channel() {
        assert_eq!(unique_channel("main", &[]), "main");
        assert_eq!(unique_channel("main", &["main"]), "main1");
        assert_eq!(unique_channel("main", &["main", "main1", "bg"]), "main2");
        assert_eq!(unique_channel("bg", &["main"]), "bg");
    }
}
