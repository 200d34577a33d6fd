//! Register machine runner.
//!
//! Assembles a program file and executes it in one of four modes.
//!
//! # Usage
//! ```text
//! regvm <program.asm> [OPTIONS]
//! ```
//!
//! # Modes
//! - `run`: run to halt and print the final registers and an execution profile
//! - `signal`: find the lowest seed that makes the program emit 0, 1, 0, 1, ...
//! - `recover`: run with sound semantics and print the recovered value
//! - `duet`: run two machines joined by channels and print their send counts
//!
//! Logging is controlled by `REGVM_LOG` (`debug|info|warn|error`) and
//! `REGVM_LOG_TIMESTAMPS` (`0` disables timestamps).

use regvm::utils::log;
use regvm::virtual_machine::assembler::{assemble_file, parse_reg_value};
use regvm::virtual_machine::duet::{DEFAULT_ID_REGISTER, DualRunner, DuetConfig};
use regvm::virtual_machine::errors::VMError;
use regvm::virtual_machine::operand::Register;
use regvm::virtual_machine::program::Program;
use regvm::virtual_machine::vm::signal::{SignalSearch, search_signal_seed};
use regvm::virtual_machine::vm::{ExecStats, Machine, MachineConfig, Outcome, RegisterFile};
use regvm::{debug, error, info, warn};
use std::env;
use std::path::Path;
use std::process;

/// Step budget per attempt when searching for a signal seed without `--max-steps`.
const DEFAULT_SIGNAL_STEPS: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Run,
    Signal,
    Recover,
    Duet,
}

impl Mode {
    fn parse(name: &str) -> Option<Mode> {
        match name {
            "run" => Some(Mode::Run),
            "signal" => Some(Mode::Signal),
            "recover" => Some(Mode::Recover),
            "duet" => Some(Mode::Duet),
            _ => None,
        }
    }
}

struct Options {
    mode: Mode,
    registers: RegisterFile,
    max_steps: Option<u64>,
    signal_register: Register,
    signal_length: usize,
    signal_limit: i64,
}

#[tokio::main]
async fn main() {
    log::init_from_env();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let options = parse_options(&args);

    if !Path::new(input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    let program = match assemble_file(input_path) {
        Ok(p) => p,
        Err(e) => {
            error!("Assembly failed: {}", e);
            process::exit(1);
        }
    };
    debug!("Loaded {} instruction(s):\n{}", program.len(), program);

    let result = match options.mode {
        Mode::Run => run(program, &options),
        Mode::Signal => signal(&program, &options),
        Mode::Recover => recover(program, &options),
        Mode::Duet => duet(program, &options).await,
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}

/// Parses everything after the input path, exiting on malformed arguments.
fn parse_options(args: &[String]) -> Options {
    let mut options = Options {
        mode: Mode::Run,
        registers: RegisterFile::new(),
        max_steps: None,
        signal_register: Register::letter('a'),
        signal_length: 100,
        signal_limit: 10_000,
    };

    let mut i = 2;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--mode" | "-m" | "--reg" | "-r" | "--max-steps" | "--signal-register"
            | "--signal-length" | "--signal-limit" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    error!("{flag} requires an argument");
                    process::exit(1);
                };
                apply_option(&mut options, flag, value);
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }
    options
}

fn apply_option(options: &mut Options, flag: &str, value: &str) {
    match flag {
        "--mode" | "-m" => {
            options.mode = Mode::parse(value).unwrap_or_else(|| {
                error!("Unknown mode: '{value}' (expected run, signal, recover or duet)");
                process::exit(1);
            });
        }
        "--reg" | "-r" => {
            let (r, v) = parse_reg_value(value).unwrap_or_else(|e| {
                error!("Invalid register assignment '{value}': {e}");
                process::exit(1);
            });
            options.registers.set(r, v);
        }
        "--signal-register" => {
            options.signal_register = value
                .parse::<char>()
                .map_err(|_| VMError::InvalidRegister {
                    name: value.to_string(),
                })
                .and_then(Register::new)
                .unwrap_or_else(|e| {
                    error!("{e}");
                    process::exit(1);
                });
        }
        "--max-steps" => options.max_steps = Some(parse_number(flag, value)),
        "--signal-length" => options.signal_length = parse_number(flag, value),
        "--signal-limit" => options.signal_limit = parse_number(flag, value),
        _ => {
            error!("Unexpected argument: {flag}");
            process::exit(1);
        }
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> T {
    value.parse::<T>().unwrap_or_else(|_| {
        error!("Invalid value for {flag}: '{value}' is not a valid number");
        process::exit(1);
    })
}

fn machine_config(options: &Options) -> MachineConfig {
    MachineConfig {
        max_steps: options.max_steps,
        ..MachineConfig::default()
    }
}

fn run(program: Program, options: &Options) -> Result<(), VMError> {
    let mut machine =
        Machine::with_config(program, machine_config(options)).with_registers(options.registers);
    match machine.run()? {
        Outcome::Halted(regs) => info!("Halted after {} step(s): {}", machine.stats().steps(), regs),
        Outcome::Blocked { pc } => warn!("Blocked on RCV at pc {pc} with nothing to receive"),
        other => debug!("Stopped: {other:?}"),
    }
    if !machine.outputs().is_empty() {
        info!("Output: {:?}", machine.outputs());
    }
    print_profile(machine.stats());
    Ok(())
}

fn signal(program: &Program, options: &Options) -> Result<(), VMError> {
    let search = SignalSearch {
        registers: options.registers,
        register: options.signal_register,
        seeds: 0..options.signal_limit,
        target: options.signal_length,
        max_steps: Some(options.max_steps.unwrap_or(DEFAULT_SIGNAL_STEPS)),
    };
    match search_signal_seed(program, &search)? {
        Some(seed) => info!("Lowest seed for {}: {seed}", search.register),
        None => warn!(
            "No seed below {} produced {} alternating output(s)",
            options.signal_limit, options.signal_length
        ),
    }
    Ok(())
}

fn recover(program: Program, options: &Options) -> Result<(), VMError> {
    let mut machine =
        Machine::with_config(program, machine_config(options)).with_registers(options.registers);
    match machine.run_recover()? {
        Outcome::Recovered(value) => info!("Recovered frequency: {value}"),
        other => warn!("Program stopped without recovering a value: {other:?}"),
    }
    Ok(())
}

async fn duet(program: Program, options: &Options) -> Result<(), VMError> {
    let config = DuetConfig {
        registers: options.registers,
        id_register: DEFAULT_ID_REGISTER,
        machine: machine_config(options),
        jitter: None,
    };
    let report = DualRunner::with_config(program, config).run().await?;
    for id in 0..2 {
        info!(
            "Machine {id}: {} after {} send(s)",
            report.terminations[id], report.sends[id]
        );
    }
    Ok(())
}

fn print_profile(stats: &ExecStats) {
    let total = stats.steps();
    let op_w = 2 + stats
        .iter()
        .map(|(op, _)| op.mnemonic().len())
        .max()
        .unwrap_or(0)
        .max("total".len());
    let count_w = format_with_commas(total).chars().count();
    let dash_w = op_w + 1 + count_w + 2 + "( 100.0%)".len();

    println!("Execution Profile:");
    println!("{}", "-".repeat(dash_w));
    for (op, count) in stats.iter() {
        if count == 0 {
            continue;
        }
        let percent = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "{:<op_w$} {:>count_w$} ({:>5.1}%)",
            op.mnemonic(),
            format_with_commas(count),
            percent,
        );
    }
    println!("{}", "-".repeat(dash_w));
    println!(
        "{:<op_w$} {:>count_w$} ({:>5.1}%)",
        "total",
        format_with_commas(total),
        100.0,
    );
    if stats.skipped() > 0 {
        warn!("{} instruction(s) skipped after toggling", stats.skipped());
    }
}

fn format_with_commas(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

const USAGE: &str = "\
Register Machine Runner

USAGE:
    {program} <program.asm> [OPTIONS]

ARGS:
    <program.asm>    Assembly source file to run

OPTIONS:
    -m, --mode <mode>           run | signal | recover | duet (default: run)
    -r, --reg <x=N>             Set initial register value (repeatable)
        --max-steps <N>         Abort after N executed instructions
        --signal-register <x>   Register seeded by the signal search (default: a)
        --signal-length <N>     Alternating outputs required (default: 100)
        --signal-limit <N>      Seeds to try, starting at 0 (default: 10000)
    -h, --help                  Print this help message

EXAMPLES:
    # Run with c preset to 1
    {program} program.asm -r c=1

    # Find the clock-signal seed
    {program} program.asm -m signal

    # Run two machines against each other
    {program} program.asm -m duet
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
