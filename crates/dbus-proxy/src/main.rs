//! `dbus-proxy-inspect`: prints the proxy surface of a remote object.
//!
//! Reads an introspection tree (the JSON form of a parsed `<node>` element),
//! builds an [`InterfaceProxy`] for every valid interface of the configured
//! object and prints its methods, its signals with the match rule each would
//! install, and its properties.  Invalid interfaces are skipped.
//!
//! ```text
//! main()
//!  └─ Args::parse()          -- CLI flags, with env fallbacks
//!  └─ ProxyConfig::load_from -- [object] and [logging] from TOML
//!  └─ read tree JSON         -- ObjectNode
//!  └─ InterfaceProxy::new    -- one per interface, on an offline MemoryBus
//!  └─ print report
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use dbus_proxy::infrastructure::bus::memory::MemoryBus;
use dbus_proxy::infrastructure::bus::Bus;
use dbus_proxy::infrastructure::config::ProxyConfig;
use dbus_proxy::InterfaceProxy;
use dbus_proxy_core::domain::introspection::ObjectNode;
use dbus_proxy_core::MatchRule;

#[derive(Debug, Parser)]
#[command(name = "dbus-proxy-inspect", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, env = "DBUS_PROXY_CONFIG", default_value = "dbus-proxy.toml")]
    config: PathBuf,

    /// Introspection tree in JSON form.
    #[arg(short, long)]
    tree: PathBuf,

    /// Only report this interface.
    #[arg(short, long)]
    interface: Option<String>,

    /// Overrides `[logging] level` from the config file.
    #[arg(long, env = "DBUS_PROXY_LOG")]
    log_level: Option<String>,

    /// Overrides `[object] bus_name` from the config file.
    #[arg(long)]
    bus_name: Option<String>,

    /// Overrides `[object] path` from the config file.
    #[arg(long)]
    path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ProxyConfig::load_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(bus_name) = args.bus_name {
        config.object.bus_name = bus_name;
    }
    if let Some(path) = args.path {
        config.object.path = path;
    }

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let object = config.object.object_ref()?;
    info!(bus_name = object.bus_name(), path = object.path(), "inspecting object");

    let raw = std::fs::read_to_string(&args.tree)
        .with_context(|| format!("reading {}", args.tree.display()))?;
    let tree: ObjectNode = serde_json::from_str(&raw)
        .with_context(|| format!("parsing introspection tree {}", args.tree.display()))?;

    let bus: Arc<dyn Bus> = MemoryBus::shared();
    let mut shown = 0usize;
    for node in &tree.interfaces {
        let Some(proxy) = InterfaceProxy::new(Arc::clone(&bus), object.clone(), node) else {
            warn!(name = ?node.attr("name"), "skipping invalid interface");
            continue;
        };
        if args
            .interface
            .as_deref()
            .is_some_and(|wanted| wanted != proxy.name())
        {
            debug!(interface = proxy.name(), "filtered out");
            continue;
        }
        print_interface(&proxy);
        shown += 1;
    }

    if !tree.children.is_empty() {
        println!("children: {}", tree.children.join(", "));
    }
    if shown == 0 {
        anyhow::bail!("no matching interfaces in {}", args.tree.display());
    }
    Ok(())
}

fn print_interface(proxy: &InterfaceProxy) {
    let descriptor = proxy.descriptor();
    println!("interface {}", proxy.name());

    for name in proxy.method_names() {
        if let Some(stub) = proxy.method(name) {
            let m = stub.descriptor();
            println!("  method   {}({}) -> ({})", m.name, m.in_signature, m.out_signature);
        }
    }
    for signal in descriptor.signals() {
        println!("  signal   {}({})", signal.name, signal.signature);
        println!("           {}", MatchRule::for_signal(descriptor, &signal.name));
    }
    for property in descriptor.properties() {
        println!(
            "  property {} : {} [{:?}]",
            property.name().unwrap_or("?"),
            property.type_signature().unwrap_or("?"),
            property.access()
        );
    }
}
