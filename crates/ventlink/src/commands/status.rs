//! `ventlink status`: one poll per device, then print.

use futures_util::future::join_all;
use tracing::debug;

use ventlink_core::Hub;

use crate::cli::{GlobalOpts, StatusArgs};
use crate::commands::util;
use crate::config::{self, ResolvedDevice};
use crate::error::CliError;
use crate::output::{self, DeviceView};

pub async fn handle(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let targets = config::targets(global, &cfg, args.all)?;

    let hub = Hub::new();
    let caches = match util::load_all(&hub, &targets) {
        Ok(caches) => caches,
        Err(e) => {
            hub.unload_all().await;
            return Err(e);
        }
    };

    let statuses = join_all(
        targets
            .iter()
            .zip(&caches)
            .map(|(target, cache)| util::poll_after(cache, 0, util::poll_limit(target))),
    )
    .await;

    // Entities are projected before unloading; a stopped cache reports
    // everything unavailable.
    let views: Vec<DeviceView> = targets
        .iter()
        .zip(&caches)
        .zip(statuses)
        .map(|((target, cache), status)| {
            debug!(
                device = %target.name,
                polls = status.polls,
                available = status.available,
                "first poll done"
            );
            let entities = cache.entities_of(&status);
            DeviceView::new(&target.name, status, entities)
        })
        .collect();
    hub.unload_all().await;

    let color = output::should_color(global.color);
    let rendered = match views.as_slice() {
        [only] if !args.all => {
            output::render_single(global.output, only, |v| v.detail(color), DeviceView::line)?
        }
        all => output::render_list(
            global.output,
            all,
            |v| output::StatusRow::new(v, color),
            DeviceView::line,
        )?,
    };
    output::print_output(&rendered, global.quiet);

    // A single device fails loudly; `--all` only fails when nothing answered.
    let failed: Vec<(&DeviceView, &ResolvedDevice)> = views
        .iter()
        .zip(&targets)
        .filter(|(view, _)| !view.available)
        .collect();
    if failed.len() < views.len() && args.all {
        return Ok(());
    }
    match failed.first() {
        Some((view, target)) => Err(match &view.status().last_error {
            Some(err) => CliError::unavailable(&view.name, err),
            None => CliError::Timeout {
                after: humantime::format_duration(target.polling.timeout).to_string(),
            },
        }),
        None => Ok(()),
    }
}
