//! `ventlink watch`: keep polling and print every completed poll.

use futures_util::StreamExt;
use futures_util::stream::select_all;
use tracing::{debug, info};

use ventlink_core::Hub;

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::commands::util;
use crate::config;
use crate::error::CliError;
use crate::output::{self, DeviceView};

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let mut targets = config::targets(global, &cfg, args.all)?;
    if let Some(interval) = args.interval {
        for target in &mut targets {
            target.polling.interval = interval.into();
            target.polling.validate()?;
        }
    }

    let hub = Hub::new();
    let caches = match util::load_all(&hub, &targets) {
        Ok(caches) => caches,
        Err(e) => {
            hub.unload_all().await;
            return Err(e);
        }
    };

    // Tag each status stream with its profile name so updates can be
    // attributed after merging.
    let mut updates = select_all(caches.iter().zip(&targets).map(|(cache, target)| {
        let name = target.name.clone();
        let cache = cache.clone();
        cache
            .subscribe()
            .into_stream()
            .filter(|status| std::future::ready(status.polls > 0))
            .map(move |status| {
                let entities = cache.entities_of(&status);
                DeviceView::new(&name, status, entities)
            })
            .boxed()
    }));

    let color = output::should_color(global.color);
    let format = match global.output {
        // One JSON document per line while streaming.
        OutputFormat::Json => OutputFormat::JsonCompact,
        other => other,
    };
    let mut seen = 0_u64;
    info!(devices = targets.len(), "watching");

    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break signal.map_err(CliError::from);
            }
            update = updates.next() => {
                let Some(view) = update else { break Ok(()) };
                let rendered =
                    output::render_single(format, &view, |v| v.detail(color), DeviceView::line);
                match rendered {
                    Ok(text) => output::print_output(&text, global.quiet),
                    Err(e) => break Err(e),
                }
                seen += 1;
                if args.count.is_some_and(|limit| seen >= limit) {
                    break Ok(());
                }
            }
        }
    };

    drop(updates);
    hub.unload_all().await;
    outcome
}
