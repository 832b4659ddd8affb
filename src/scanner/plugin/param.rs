//! Plugins that attack one parameter at a time

use super::Plugin;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::NameValuePair;
use crate::scanner::variant::Variant;

/// A plugin whose check runs once per injectable parameter.
///
/// Implementors call [`scan_variants`] from [`Plugin::scan`].
pub trait AppParamPlugin: Plugin {
    /// Attack `param`. `msg` is a fresh copy of the message under test and
    /// `variant` the variant that extracted `param`.
    fn scan_param(
        &mut self,
        msg: HttpMessage,
        variant: &dyn Variant,
        param: &NameValuePair,
    ) -> anyhow::Result<()>;
}

/// Run `plugin` against every non-excluded parameter of every applicable variant
pub fn scan_variants<P: AppParamPlugin + ?Sized>(plugin: &mut P) -> anyhow::Result<()> {
    let parent = plugin.parent()?;
    let base = plugin.base_message()?.clone();

    for variant in parent.variants_for(&base) {
        for param in variant.param_list() {
            if plugin.is_stop() {
                tracing::debug!("Plugin {} stopped on {}", plugin.id(), base.uri());
                return Ok(());
            }
            parent.wait_if_paused();

            if parent.is_excluded(param) {
                tracing::debug!(
                    "Skipping excluded {} parameter {:?}",
                    param.kind(),
                    param.name()
                );
                continue;
            }

            if let Err(e) = plugin.scan_param(base.clone_request(), variant.as_ref(), param) {
                tracing::warn!(
                    "Plugin {} failed on {} parameter {:?} of {}: {}",
                    plugin.id(),
                    variant.short_name(),
                    param.name(),
                    base.uri(),
                    e
                );
            }
        }
    }
    Ok(())
}
