//! slate - CLI Entry Point
//!
//! Commands:
//! - `slate run <image>` - Execute a program image on each stdin line
//! - `slate trace <image> [input]` - Single-step with an instruction trace
//! - `slate info <image>` - Describe the machine and the program

use clap::{Parser, Subcommand};
use slate::{decode, load_image, Computer, Layout, ProgramImage, Status};
use std::io;
use std::process;

#[derive(Parser)]
#[command(name = "slate")]
#[command(version)]
#[command(about = "A parameterised instructional register machine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a program image on each line of standard input
    Run {
        /// Path to the program image
        image: String,
    },
    /// Single-step a program on one input, tracing every instruction
    Trace {
        /// Path to the program image
        image: String,
        /// Input as a hexadecimal string
        #[arg(default_value = "")]
        input: String,
        /// Maximum number of half-steps
        #[arg(short, long, default_value = "10000")]
        max_steps: u64,
    },
    /// Describe the machine and a program image
    Info {
        /// Path to the program image
        image: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { image }) => run_stream(&image),
        Some(Commands::Trace {
            image,
            input,
            max_steps,
        }) => trace(&image, &input, max_steps),
        Some(Commands::Info { image }) => info(&image),
        None => banner(),
    }
}

/// Load an image file into a default machine, exiting on any error.
fn load_computer(path: &str) -> (Computer, ProgramImage) {
    let image = match load_image(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let computer = Computer::new(Layout::default());
    if let Err(e) = computer.set_image(&image) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
    (computer, image)
}

fn run_stream(path: &str) {
    let (computer, _) = load_computer(path);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if let Err(e) = computer.execute_stream(stdin.lock(), &mut stdout) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn trace(path: &str, input: &str, max_steps: u64) {
    let (computer, _) = load_computer(path);

    let loaded = computer
        .reset()
        .and_then(|_| computer.load_input(input));
    if let Err(e) = loaded {
        eprintln!("error: {}", e);
        process::exit(1);
    }

    let processor = computer.processor();
    let mut steps = 0;
    while computer.status() == Status::Success && steps < max_steps {
        let fetching = computer.next_is_fetch();
        let pc = processor.registers().pc.get();
        computer.step();
        steps += 1;

        // Print each instruction as it lands in the instruction
        // register.
        if fetching && computer.status() == Status::Success {
            let ir = processor.registers().ir.get();
            match decode(ir, computer.layout()) {
                Ok(instruction) => println!("{:03x}: {}", pc, instruction),
                Err(_) => println!("{:03x}: ??", pc),
            }
        }
    }

    println!();
    println!("Steps: {}", steps);
    println!("Status: {:?}", computer.status());
    println!("Output: {}", computer.read_output());

    if steps >= max_steps {
        println!();
        println!("Reached the step limit ({}). Use --max-steps to raise it.", max_steps);
    }
}

fn info(path: &str) {
    let (computer, image) = load_computer(path);

    println!("{}", computer.description());
    println!("Program: {} hex digits", image.len());
}

fn banner() {
    println!("slate {}", env!("CARGO_PKG_VERSION"));
    println!("A parameterised instructional register machine");
    println!();
    println!("{}", Computer::new(Layout::default()).description());
    println!();
    println!("Use --help for available commands");
}
