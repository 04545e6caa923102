use lispy::grammar::{ParseConfig, parse_syntax_with_config};
use lispy::{Environment, Evaluator, Function, Scoping, Value, read};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    init_tracing();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Install a log subscriber, only if RUST_LOG is set
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        let filter = EnvFilter::from_default_env();
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}

fn run_repl() {
    println!("Lispy Version 0.1.0");
    println!("Enter expressions like: + 1 (* 2 3)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut evaluator = Evaluator::new();

    // Register a host function that can be called from user code for demonstration purposes
    evaluator.register_builtin("help", help_builtin);

    let config = ParseConfig {
        handle_comments: true,
    };
    let mut show_tree = false;

    loop {
        match rl.readline("lispy> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Handle special commands
                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(evaluator.global());
                        continue;
                    }
                    ":tree" => {
                        show_tree = !show_tree;
                        println!(
                            "Syntax tree display {}",
                            if show_tree { "enabled" } else { "disabled" }
                        );
                        continue;
                    }
                    ":dynamic" => {
                        let scoping = match evaluator.config().scoping {
                            Scoping::Lexical => Scoping::Dynamic,
                            Scoping::Dynamic => Scoping::Lexical,
                        };
                        evaluator.set_scoping(scoping);
                        println!("Scoping is now {scoping:?}");
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match parse_syntax_with_config(line, config) {
                    Ok(tree) => {
                        if show_tree {
                            print!("{tree}");
                        }
                        let result = evaluator.evaluate(read(&tree));
                        println!("{result}");
                    }
                    Err(e) => println!("{e}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn help_builtin(_: &Evaluator, _: &Environment, _: Vec<Value>) -> Value {
    print_help();
    Value::sexpr()
}

fn print_help() {
    println!("Lispy commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :tree      - Toggle printing of the parsed syntax tree");
    println!("  :dynamic   - Toggle between lexical and dynamic scoping");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Notation:");
    println!("  Numbers: 42, -5, 2.5");
    println!("  S-expressions: (+ 1 2), evaluated");
    println!("  Q-expressions: {{1 2 3}}, quoted data");
    println!("  Comments: ; to end of line");
    println!();
    println!("Builtins:");
    println!("  Arithmetic: + - * / % pow min max (add sub mul div)");
    println!("  Lists: list head tail join init cons eval");
    println!("  Definitions: def = \\");
    println!();
    println!("Examples:");
    println!("  def {{add2}} (\\ {{a b}} {{+ a b}})");
    println!("  def {{add2to5}} (add2 5)");
    println!("  add2to5 3");
    println!("  (\\ {{a & rest}} {{rest}}) 1 2 3 4");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in functions from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Function(Function::Builtin(_)) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<10}");
            col += 1;
            if col % 6 == 0 {
                println!();
            }
        }
        if col % 6 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
