use anyhow::{Context, Result, anyhow};
use log::info;
use pico_args::Arguments;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use crate::audio::FeedbackGate;
use crate::catalog::{CatalogItem, CatalogSource, SheetCatalog};
use crate::config::{self, AppConfigState};
use crate::flipbook::FlipbookController;
use crate::locale::{Language, Locale};
use crate::logging;
use crate::router::{self, ROUTES};
use crate::session::{self, JsonSink, ViewOptions};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    let log_file: Option<PathBuf> = pargs.opt_value_from_str("--log")?;
    logging::init(log_file.as_deref())?;

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }
    let frames = pargs.contains("--frames");
    let demo: Option<usize> = pargs.opt_value_from_str("--demo")?;

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            match topic {
                Some(t) => print_subcmd_help(&t),
                None => print_help(),
            }
            Ok(())
        }

        Some("catalogs") => {
            let state = AppConfigState::load_or_install_default()?;
            let locale = Locale::detect(state.saved_language().as_deref());
            println!("{}", locale.translate("catalogs"));
            for r in ROUTES.iter() {
                let url = state.profile.catalog_url(r.catalog_key);
                println!(
                    "  {}  {:<14} {:<20} {}",
                    r.id,
                    locale.translate(r.name_key),
                    r.path(),
                    if url.is_some() { "sheet" } else { "cache only" }
                );
            }
            Ok(())
        }

        Some("fetch") => {
            let target: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: flipctl fetch <catalog>"))?;
            let route = router::resolve(&target)?;
            let state = AppConfigState::load_or_install_default()?;
            let source = SheetCatalog::from_profile(&state.profile, config::cache_dir()?);
            let items = source.fetch_catalog(route.catalog_key);
            print_response(&serde_json::json!({
                "catalog": route.catalog_key,
                "count": items.len(),
                "items": items,
            }));
            Ok(())
        }

        Some("view") => {
            let target: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: flipctl view <catalog> [--frames]"))?;
            let mut state = AppConfigState::load_or_install_default()?;
            session::run_viewer(&mut state, &target, ViewOptions { frames })
        }

        Some("simulate") => {
            let target: String = pargs.free_from_str().map_err(|_| {
                anyhow!("usage: flipctl simulate <catalog> <script|-> [--frames] [--demo N]")
            })?;
            let script_path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: flipctl simulate <catalog> <script|->"))?;
            simulate(&target, &script_path, frames, demo)
        }

        Some("lang") => {
            let state = AppConfigState::load_or_install_default()?;
            let mut locale = Locale::detect(state.saved_language().as_deref());
            let code: Option<String> = pargs.free_from_str().ok();
            match code {
                Some(code) => {
                    locale.set_language(&code)?;
                    state.save_language(locale.current_language().code())?;
                    println!("ok: language {}", locale.current_language());
                }
                None => {
                    let all: Vec<&str> = Language::ALL.iter().map(|l| l.code()).collect();
                    println!(
                        "{} (available: {})",
                        locale.current_language(),
                        all.join(", ")
                    );
                }
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: flipctl use <profile_name>"))?;
            let mut state = AppConfigState::load_or_install_default()?;
            state.set_active(&name)?;
            println!("ok: active profile {name}");
            Ok(())
        }

        Some("list") => {
            let state = AppConfigState::load_or_install_default()?;
            for name in state.list_profiles() {
                let mark = if name == state.active_name { "*" } else { " " };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("doctor") => {
            let state = AppConfigState::load_or_install_default()?;
            print_response(&state.doctor_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn simulate(target: &str, script_path: &str, frames: bool, demo: Option<usize>) -> Result<()> {
    let route = router::resolve(target)?;
    let state = AppConfigState::load_or_install_default()?;
    let th = &state.profile.thresholds;

    let items = match demo {
        Some(n) => (1..=n)
            .map(|i| CatalogItem::new(format!("DEMO-{i:03}"), format!("demo/{i:03}.jpg")))
            .collect(),
        None => SheetCatalog::from_profile(&state.profile, config::cache_dir()?)
            .fetch_catalog(route.catalog_key),
    };
    if items.is_empty() {
        return Err(anyhow!(
            "{} has no pages; pass --demo N to simulate on generated pages",
            route.catalog_key
        ));
    }

    let reader: Box<dyn BufRead> = if script_path == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let f = File::open(script_path).with_context(|| format!("open {script_path}"))?;
        Box::new(BufReader::new(f))
    };
    let script = session::read_script(reader)?;

    let mut flipbook = FlipbookController::new(
        items,
        state.profile.surface.into(),
        th,
        FeedbackGate::silent(th.sound_debounce_ms),
    );
    let mut sink = JsonSink::new(io::stdout().lock(), frames);
    let summary = session::replay(&mut flipbook, &script, th.frame_ms, &mut sink)?;
    drop(sink);
    info!(
        "simulate: {} event(s), {} commit(s), ended on page {}",
        summary.events,
        summary.commits,
        summary.final_index + 1
    );
    println!("{}", serde_json::json!({ "summary": summary }));
    Ok(())
}

fn print_help() {
    println!(
        r#"flipctl - page-flip catalog viewer for touch kiosks

USAGE:
  flipctl help [command]                   Show general or command-specific help
  flipctl catalogs                         List the catalog screens
  flipctl fetch <catalog>                  Fetch a catalog (sheet, then cache) and print it
  flipctl view <catalog> [--frames]        Run the flipbook on the local touchscreen
  flipctl simulate <catalog> <script|->    Replay a pointer script on a virtual clock
  flipctl lang [code]                      Show or set the UI language (tr, en, ru)
  flipctl list                             List profiles
  flipctl use <name>                       Switch active profile
  flipctl doctor                           Diagnose permissions/devices/config

OPTIONS:
  --log <file>                             Write logs to <file> instead of stderr
  --frames                                 Emit every frame as a JSON line
  --demo <N>                               simulate: use N generated pages

TIPS:
  - Profiles: ~/.config/flipctl/profiles (FLIPCTL_CONFIG_DIR overrides)
  - Catalog cache: ~/.cache/flipctl (FLIPCTL_CACHE_DIR overrides)
  - Drive API key: [drive] api_key or FLIPCTL_DRIVE_API_KEY
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "catalogs" => println!(
            "usage: flipctl catalogs\nLists the three catalog screens and whether a sheet URL is set."
        ),
        "fetch" => println!(
            "usage: flipctl fetch <catalog>\nDownloads the sheet, refreshes the cache and prints the items.\nFalls back to the cache, then to an empty list."
        ),
        "view" => println!(
            "usage: flipctl view <catalog> [--frames]\n<catalog> is catalog1..3, 1..3 or /catalog/catalogN.\nStops on SIGINT/SIGTERM; the active profile reloads on edit."
        ),
        "simulate" => println!(
            "usage: flipctl simulate <catalog> <script|-> [--frames] [--demo N]\nScript lines are JSON: {{\"kind\":\"down|move|up\",\"x\":..,\"t_ms\":..}}.\nPrints flip events (and frames with --frames), then a summary."
        ),
        "lang" => println!("usage: flipctl lang [tr|en|ru]\nWithout a code, prints the current language."),
        "use" => println!("usage: flipctl use <name>\nSwitches the active profile to <name>."),
        "list" => println!("usage: flipctl list\nLists available profiles; marks active with '*'."),
        "doctor" => println!(
            "usage: flipctl doctor\nChecks input permissions, touch devices, sound cue and catalog URLs."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
