//! Command line OSVR client.
//!
//! Each subcommand connects to the running OSVR server, subscribes to one
//! interface and prints every report while pumping the context, or reads a
//! string parameter once.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use osvr_clientkit::{ClientContext, ClientFlags, LoaderConfig};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Application identifier, in reverse-order DNS form
    #[arg(long, global = true)]
    app_id: Option<String>,

    /// Path to the ClientKit shared library [env: OSVR_CLIENTKIT_LIBRARY]
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Number of updates to pump before exiting
    #[arg(short = 'n', long, global = true, default_value_t = 1_000_000)]
    iterations: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print pose, position and orientation reports of a tracker
    Tracker {
        #[arg(long, default_value = "/me/hands/left")]
        path: String,
    },
    /// Print button presses and releases
    Button {
        #[arg(long, default_value = "/controller/left/1")]
        path: String,
    },
    /// Print analog channel values
    Analog {
        #[arg(long, default_value = "/controller/left/trigger")]
        path: String,
    },
    /// Print a string parameter, by default the display description
    Display {
        #[arg(long, default_value = "/display")]
        path: String,
    },
}

impl Command {
    fn default_app_id(&self) -> &'static str {
        match self {
            Command::Tracker { .. } => "org.opengoggles.exampleclients.rust.TrackerCallback",
            Command::Button { .. } => "org.opengoggles.exampleclients.rust.ButtonCallback",
            Command::Analog { .. } => "org.opengoggles.exampleclients.rust.AnalogCallback",
            Command::Display { .. } => "org.opengoggles.exampleclients.rust.DisplayParameter",
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let loader = match &args.library {
        Some(path) => LoaderConfig::with_library_path(path),
        None => LoaderConfig::from_env(),
    };
    let app_id = args
        .app_id
        .as_deref()
        .unwrap_or_else(|| args.command.default_app_id());

    let context = ClientContext::with_loader(&loader, app_id, ClientFlags::empty())
        .context("failed to start the OSVR client context")?;

    match &args.command {
        Command::Tracker { path } => {
            let iface = context.get_interface(path)?;
            iface.on_pose(|_, report| {
                let (t, r) = (report.pose.translation, report.pose.rotation);
                println!(
                    "Got POSE report: Position = ({}, {}, {}), orientation ({}, {}, {}, {})",
                    t.x, t.y, t.z, r.w, r.x, r.y, r.z
                );
            })?;
            iface.on_orientation(|_, report| {
                let r = report.rotation;
                println!(
                    "Got ORIENTATION report: Orientation = ({}, {}, {}, {})",
                    r.w, r.x, r.y, r.z
                );
            })?;
            iface.on_position(|_, report| {
                let t = report.xyz;
                println!("Got POSITION report: Position = ({}, {}, {})", t.x, t.y, t.z);
            })?;
            pump(&context, args.iterations)?;
        }
        Command::Button { path } => {
            let iface = context.get_interface(path)?;
            iface.on_button(|_, report| {
                let state = if report.is_pressed() { "pressed" } else { "released" };
                println!("Got report: button is {state}");
            })?;
            pump(&context, args.iterations)?;
        }
        Command::Analog { path } => {
            let iface = context.get_interface(path)?;
            iface.on_analog(|_, report| {
                println!("Got report: channel is {}", report.state);
            })?;
            pump(&context, args.iterations)?;
        }
        Command::Display { path } => {
            let value = context.get_string_parameter(path)?;
            println!("Got value of {path}:");
            println!("{value}");
        }
    }

    context.dispose();
    println!("Library shut down; exiting.");
    Ok(())
}

fn pump(context: &ClientContext, iterations: u64) -> anyhow::Result<()> {
    for _ in 0..iterations {
        context.update()?;
    }
    Ok(())
}
