//! DAT simulator - Main Entry Point
//!
//! Usage: dat-sim [OPTIONS] <scenario_file>...
//!
//! Arguments:
//!   scenario_file - Exercise to solve (see `dat_sim::io` for the format)
//!
//! Options:
//!   -v, --verbose     Log every translation and replacement step
//!   -l, --list-disks  Print the disk model catalog
//!   -h, --help        Print help information

use std::env;
use std::process;

use dat_sim::disk::{DiskCatalog, PageTransfer};
use dat_sim::io::{Exercise, Scenario, read_scenario};
use dat_sim::memory::cell_count;
use dat_sim::replacement::QueueName;
use dat_sim::translation::{FaultResult, Translation, translate};

/// Command-line configuration
struct Config {
    scenario_files: Vec<String>,
    verbose: bool,
    list_disks: bool,
}

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if config.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let failures = run(&config);
    if failures > 0 {
        eprintln!("{} scenario(s) failed", failures);
        process::exit(1);
    }
}

fn print_help(program: &str) {
    eprintln!("DAT simulator - virtual to real address translation with LRU second chance");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] <scenario_file>...", program);
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  scenario_file - Exercise file (address, entry, disk, queues, evicted)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -v, --verbose     Log every translation and replacement step");
    eprintln!("  -l, --list-disks  Print the disk model catalog");
    eprintln!("  -h, --help        Print this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} demos/no_fault.txt", program);
    eprintln!("  {} -v demos/*.txt", program);
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("dat-sim");

    let mut verbose = false;
    let mut list_disks = false;
    let mut scenario_files = Vec::new();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help(program);
                process::exit(0);
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-l" | "--list-disks" => {
                list_disks = true;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}\nUse --help for usage information.", arg));
            }
            _ => {
                scenario_files.push(arg.clone());
            }
        }
    }

    if scenario_files.is_empty() && !list_disks {
        print_help(program);
        return Err("\nError: Expected at least one scenario file".to_string());
    }

    Ok(Config {
        scenario_files,
        verbose,
        list_disks,
    })
}

/// Solve every scenario, reporting failures per file. Returns the failure count.
fn run(config: &Config) -> usize {
    // One catalog per run; custom geometries from earlier files stay available
    let mut catalog = DiskCatalog::new();

    if config.list_disks {
        println!("Disk models:");
        for (name, geometry) in catalog.iter() {
            println!("  {:<6} {} ({} slots/cylinder)", name, geometry, geometry.slots_per_cylinder());
        }
        println!();
    }

    let mut failures = 0;
    for path in &config.scenario_files {
        println!("=== {} ===", path);
        if let Err(e) = solve(path, &mut catalog) {
            eprintln!("Error in {}: {}", path, e);
            failures += 1;
        }
        println!();
    }
    failures
}

fn solve(path: &str, catalog: &mut DiskCatalog) -> dat_sim::Result<()> {
    let content = read_scenario(path)?;
    let scenario = Scenario::parse(&content)?;
    let (model, geometry) = scenario.disk.resolve(catalog)?;

    println!("Disk {}: {}", model, geometry);
    if let Some(kb) = scenario.real_memory_kb {
        println!("Real storage: {} KB = {} cells", kb, cell_count(kb));
    }

    match &scenario.exercise {
        Exercise::Translate { .. } => {
            let translation = translate(&scenario.request(catalog)?)?;
            print_translation(&translation);
        }
        Exercise::Transfer { .. } => {
            let transfer = scenario.transfer(catalog)?;
            print_transfer("Transfer", &transfer);
        }
    }
    Ok(())
}

fn print_translation(translation: &Translation) {
    let address = translation.address();
    let entry = translation.entry();
    let absolute_page = address.absolute_page();

    println!("dV {} = {}", address.to_hex(), address.to_binary());
    println!(
        "  S = {} ({:02X})  P = {} ({:02X})  d = {} ({:03X})",
        address.segment, address.segment, address.page, address.page, address.offset, address.offset
    );
    println!("  absolute page = {} ({})", absolute_page, absolute_page.to_hex());
    println!(
        "PTE {} = {}, I = {}",
        entry.entry.to_hex(),
        entry.entry.to_binary(),
        entry.invalid_bit
    );

    match translation {
        Translation::NoFault(result) => {
            println!("  page present in frame {}", result.frame);
        }
        Translation::Fault(result) => {
            println!("  page fault");
            print_fault(result);
        }
    }

    let real = translation.real_address();
    println!(
        "DR = DC + d = {} + {:03X} = {} ({})",
        real.base_hex(),
        real.offset,
        real.to_hex(),
        real.value
    );
    println!("   = {}", real.to_binary());
}

fn print_fault(result: &FaultResult) {
    let eviction = &result.eviction;

    println!("Replacement queues (head first):");
    for name in QueueName::ALL {
        let entries: Vec<String> = eviction.before[name].iter().map(|e| e.to_string()).collect();
        println!("  {:<3} {}", name, entries.join(" "));
    }
    for (i, step) in eviction.steps.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, step);
    }
    println!(
        "  victim: frame {} (R={}, C={})",
        eviction.victim.frame, eviction.victim.referenced as u8, eviction.victim.modified as u8
    );

    println!("Evicted {}", result.evicted);
    match &result.page_out {
        Some(transfer) => print_transfer("Page-out", transfer),
        None => println!("Page-out: not needed (C=0)"),
    }
    print_transfer("Page-in", &result.page_in);
    println!(
        "New PTEs: incoming {} ({}), evicted {} ({})",
        result.rebuilt.incoming.to_hex(),
        result.rebuilt.incoming.to_binary(),
        result.rebuilt.outgoing.to_hex(),
        result.rebuilt.outgoing.to_binary()
    );
}

fn print_transfer(label: &str, transfer: &PageTransfer) {
    let epa = &transfer.locator;
    println!(
        "{}: page {} on {} / frame {} at DC {}",
        label,
        transfer.absolute_page,
        epa,
        transfer.frame,
        transfer.frame_base_hex()
    );
    println!(
        "  cylinder = {} / {} = {}, track = {} / {} = {}, slot = {}",
        transfer.absolute_page,
        epa.slots_per_cylinder,
        epa.cylinder,
        transfer.absolute_page % epa.slots_per_cylinder,
        epa.slots_per_track,
        epa.track,
        epa.slot
    );
    println!("  DC = {} * 2048 = {}", transfer.frame, transfer.frame_base_binary());
}
