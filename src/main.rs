//! Command line driver for the Intcode machine.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use tracing::{info, warn, Level};

use intcode::{disassemble, parse_program, pipeline, Input, Machine, MachineConfig, Output, Word};

const USAGE: &str = "\
usage: intcode run <FILE> [-i N,N,...] [--stdin] [--dump] [-v|-vv]
       intcode amplify <FILE> --phases N,N,... [--seed N] [--open] [-v|-vv]
       intcode disasm <FILE>";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
  Run { inputs: Vec<Word>, stdin: bool, dump: bool },
  Amplify { phases: Vec<Word>, seed: Word, open: bool },
  Disassemble,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
  command   : Command,
  file      : PathBuf,
  verbosity : u8,
}

fn parse_list(text: &str) -> anyhow::Result<Vec<Word>> {
  text
    .split(',')
    .map(|field| field.trim().parse::<Word>().with_context(|| format!("bad number {:?}", field)))
    .collect()
}

fn parse_args<I: Iterator<Item = String>>(mut argv: I) -> anyhow::Result<Args> {
  let command = argv.next().ok_or_else(|| anyhow!("missing command"))?;

  let mut file = None;
  let mut inputs = Vec::new();
  let mut phases = None;
  let mut seed = 0;
  let (mut stdin, mut dump, mut open) = (false, false, false);
  let mut verbosity = 0;

  while let Some(arg) = argv.next() {
    match arg.as_str() {
      "-i" | "--input" => {
        let list = argv.next().ok_or_else(|| anyhow!("{} needs a value", arg))?;
        inputs.extend(parse_list(&list)?);
      }
      "--phases" => {
        let list = argv.next().ok_or_else(|| anyhow!("--phases needs a value"))?;
        phases = Some(parse_list(&list)?);
      }
      "--seed" => {
        let value = argv.next().ok_or_else(|| anyhow!("--seed needs a value"))?;
        seed = value.trim().parse().with_context(|| format!("bad seed {:?}", value))?;
      }
      "--stdin" => stdin = true,
      "--dump"  => dump = true,
      "--open"  => open = true,
      "-v"      => verbosity += 1,
      "-vv"     => verbosity += 2,
      flag if flag.starts_with('-') => bail!("unknown flag {}", flag),
      path => {
        if file.replace(PathBuf::from(path)).is_some() {
          bail!("more than one program file given");
        }
      }
    }
  }

  let command = match command.as_str() {
    "run"     => Command::Run { inputs, stdin, dump },
    "amplify" => Command::Amplify {
      phases: phases.ok_or_else(|| anyhow!("amplify needs --phases"))?,
      seed,
      open,
    },
    "disasm"  => Command::Disassemble,
    other     => bail!("unknown command {}", other),
  };
  let file = file.ok_or_else(|| anyhow!("missing program file"))?;

  Ok(Args { command, file, verbosity })
}

/// Inputs given on the command line, followed by integers typed on standard input if enabled.
struct Console {
  queued : VecDeque<Word>,
  stdin  : Option<io::Stdin>,
}

impl Input for Console {
  fn read(&mut self) -> Option<Word> {
    while self.queued.is_empty() {
      let stdin = self.stdin.as_ref()?;
      eprint!("input> ");
      let mut line = String::new();
      match stdin.lock().read_line(&mut line) {
        Ok(0) | Err(_) => return None,
        Ok(_)          => {}
      }
      for token in line.split_whitespace() {
        match token.parse::<Word>() {
          Ok(value) => self.queued.push_back(value),
          Err(_)    => warn!(%token, "ignoring input that is not an integer"),
        }
      }
    }
    self.queued.pop_front()
  }
}

/// Prints each output as soon as the machine produces it.
struct Printer;

impl Output for Printer {
  fn write(&mut self, value: Word) -> Result<(), Word> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", value).map_err(|_| value)
  }
}

fn main() -> anyhow::Result<()> {
  let args = match parse_args(std::env::args().skip(1)) {
    Ok(args)   => args,
    Err(error) => {
      eprintln!("{}\n{}", error, USAGE);
      std::process::exit(2);
    }
  };

  let level = match args.verbosity {
    0 => Level::WARN,
    1 => Level::DEBUG,
    _ => Level::TRACE,
  };
  tracing_subscriber::fmt()
    .with_max_level(level)
    .with_writer(io::stderr)
    .with_target(false)
    .compact()
    .init();

  let text = fs::read_to_string(&args.file)
    .with_context(|| format!("failed to read {}", args.file.display()))?;
  let program = parse_program(&text)
    .with_context(|| format!("failed to parse {}", args.file.display()))?;
  info!(words = program.len(), file = %args.file.display(), "loaded program");

  match args.command {

    Command::Run { inputs, stdin, dump } => {
      let config = MachineConfig::from_env().traced(args.verbosity > 1);
      let mut machine = Machine::with_config(&program, config);
      let mut console = Console {
        queued : inputs.into(),
        stdin  : if stdin { Some(io::stdin()) } else { None },
      };
      let result = machine.run(&mut console, &mut Printer);
      if dump {
        eprintln!("{}", machine);
      }
      result?;
      info!(steps = machine.steps(), "halted");
    }

    Command::Amplify { phases, seed, open } => {
      let result = match open {
        true  => pipeline::chain(&program, &phases, seed)?,
        false => pipeline::feedback_loop(&program, &phases, seed)?
      };
      println!("{}", result);
    }

    Command::Disassemble => {
      for line in disassemble(&program) {
        println!("{}", line);
      }
    }

  }

  Ok(())
}
