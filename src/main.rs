//! vertigo CLI - Query and manage VirtualBox VMs

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vertigo::backend::{LocalVBoxBackend, LocalVBoxConfig};
use vertigo::{
    parse_record_blocks, parse_vm_list, CreateVmOptions, Error, ListKind, ListTarget, ParseMode,
    Result, VBoxBackend, Vm, VmLookup,
};

#[derive(Parser)]
#[command(name = "vertigo")]
#[command(about = "Query and manage VirtualBox VMs through VBoxManage", long_about = None)]
#[command(version)]
struct Cli {
    /// VBoxManage executable to run
    #[arg(long, global = true, env = "VBOXMANAGE", default_value = "VBoxManage")]
    vboxmanage: PathBuf,

    /// Log every VBoxManage invocation to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the VirtualBox version
    Version,

    /// List VMs, host devices and other VirtualBox resources
    List {
        /// Resource to list (vms, runningvms, ostypes, hdds, ...) or "all"
        #[arg(default_value = "all")]
        target: String,
        /// Pass --long to VBoxManage
        #[arg(long)]
        long: bool,
        /// Print parsed output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the parsed info of a VM
    Show {
        /// VM name (or UUID with --uuid)
        vm: String,
        /// Treat the argument as a UUID
        #[arg(long)]
        uuid: bool,
        /// Include extended details (--details)
        #[arg(long)]
        details: bool,
        /// Parse the human-oriented output instead of --machinereadable
        #[arg(long)]
        human: bool,
        /// Print the parsed info as JSON
        #[arg(long, conflicts_with = "raw")]
        json: bool,
        /// Print VBoxManage's output unparsed
        #[arg(long)]
        raw: bool,
    },

    /// Create a new VM
    Create {
        /// Name for the new VM
        name: String,
        /// OS type identifier (see `vertigo list ostypes`)
        #[arg(long)]
        ostype: Option<String>,
        /// Register the VM with VirtualBox
        #[arg(long)]
        register: bool,
        /// Folder to store the VM files in
        #[arg(long)]
        basefolder: Option<String>,
        /// UUID for the new VM
        #[arg(long)]
        uuid: Option<String>,
    },

    /// Register a VM from its settings file
    Register {
        /// Path to the .vbox settings file
        file: PathBuf,
    },

    /// Unregister a VM
    Unregister {
        /// VM name (or UUID with --uuid)
        vm: String,
        /// Treat the argument as a UUID
        #[arg(long)]
        uuid: bool,
        /// Also delete the VM's files
        #[arg(long)]
        delete: bool,
    },
}

fn info(msg: &str) {
    println!("{} {}", "[INFO]".blue(), msg);
}

fn success(msg: &str) {
    println!("{} {}", "[OK]".green(), msg);
}

fn warn(msg: &str) {
    println!("{} {}", "[WARN]".yellow(), msg);
}

fn error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red(), msg);
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("vertigo=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vertigo=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn lookup(vm: &str, by_uuid: bool) -> Result<VmLookup> {
    if by_uuid {
        VmLookup::by_uuid(vm)
    } else {
        VmLookup::by_name(vm)
    }
}

/// Parse `list` output for JSON printing. `--long` output is always
/// detail blocks, VM lists included.
fn list_json(kind: ListKind, long: bool, raw: &str) -> Result<serde_json::Value> {
    let value = if kind.is_vm_list() && !long {
        serde_json::to_value(parse_vm_list(raw)?)?
    } else {
        serde_json::to_value(parse_record_blocks(raw, ParseMode::Detailed, true)?)?
    };
    Ok(value)
}

fn cmd_version(backend: &impl VBoxBackend) -> Result<()> {
    println!("{}", backend.version()?);
    Ok(())
}

fn cmd_list(backend: &impl VBoxBackend, target: &str, long: bool, json: bool) -> Result<()> {
    let target: ListTarget = target.parse()?;

    match (target, json) {
        (ListTarget::One(kind), false) => {
            print!("{}", backend.list(kind, long)?);
        }
        (ListTarget::One(kind), true) => {
            let value = list_json(kind, long, &backend.list(kind, long)?)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        (ListTarget::All, false) => {
            for (kind, raw) in backend.list_all(long)? {
                info(&format!("{}:", kind));
                print!("{}", raw);
                println!();
            }
        }
        (ListTarget::All, true) => {
            let mut all = serde_json::Map::new();
            for (kind, raw) in backend.list_all(long)? {
                all.insert(kind.as_str().to_string(), list_json(kind, long, &raw)?);
            }
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
    }

    Ok(())
}

struct ShowOptions {
    by_uuid: bool,
    details: bool,
    human: bool,
    json: bool,
    raw: bool,
}

fn cmd_show(backend: &impl VBoxBackend, vm: &str, opts: ShowOptions) -> Result<()> {
    let mut machine = lookup(vm, opts.by_uuid)?.resolve(backend)?;

    if opts.details || opts.human {
        machine.refresh(opts.details, !opts.human)?;
    }

    if opts.raw {
        print!("{}", machine.raw_info());
        return Ok(());
    }
    if opts.json {
        println!("{}", serde_json::to_string_pretty(machine.info())?);
        return Ok(());
    }

    info(&format!("VM {}", machine.identity()));
    let width = machine
        .info()
        .keys()
        .map(str::len)
        .max()
        .unwrap_or(0)
        .min(32);
    for (key, value) in machine.info().iter() {
        println!("  {:<width$}  {}", key, value, width = width);
    }

    Ok(())
}

fn cmd_create(backend: &impl VBoxBackend, options: CreateVmOptions) -> Result<()> {
    info(&format!("Creating VM '{}'...", options.name));

    if options.register {
        let vm = Vm::create(backend, &options)?;
        success(&format!("Created and registered VM {}", vm.identity()));
    } else {
        print!("{}", backend.create_vm(&options)?);
        success(&format!("Created VM '{}'", options.name));
        info("Register it with: vertigo register <settings file>");
    }

    Ok(())
}

fn cmd_register(backend: &impl VBoxBackend, file: &Path) -> Result<()> {
    info(&format!("Registering VM from {}...", file.display()));
    backend.register_vm(file)?;
    success(&format!("Registered VM from {}", file.display()));
    Ok(())
}

fn cmd_unregister(backend: &impl VBoxBackend, vm: &str, by_uuid: bool, delete: bool) -> Result<()> {
    let machine = lookup(vm, by_uuid)?.resolve(backend)?;
    let identity = machine.identity().clone();

    if delete {
        warn(&format!(
            "This will permanently delete VM {} and all its files!",
            identity
        ));

        // Read confirmation from stdin
        use std::io::{self, Write};
        print!("Type 'DELETE' to confirm: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if input.trim() != "DELETE" {
            return Err(Error::Other("Aborted".to_string()));
        }
    }

    info(&format!("Unregistering VM {}...", identity));
    machine.unregister(delete)?;
    if delete {
        success(&format!("VM {} unregistered and deleted", identity));
    } else {
        success(&format!("VM {} unregistered", identity));
    }

    Ok(())
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if nix::unistd::geteuid().is_root() {
        tracing::warn!("running as root: VirtualBox registers VMs per user");
    }

    let backend = LocalVBoxBackend::with_config(LocalVBoxConfig {
        program: cli.vboxmanage,
    });

    match cli.command {
        None => cmd_list(&backend, "vms", false, false),
        Some(Commands::Version) => cmd_version(&backend),
        Some(Commands::List { target, long, json }) => cmd_list(&backend, &target, long, json),
        Some(Commands::Show {
            vm,
            uuid,
            details,
            human,
            json,
            raw,
        }) => cmd_show(
            &backend,
            &vm,
            ShowOptions {
                by_uuid: uuid,
                details,
                human,
                json,
                raw,
            },
        ),
        Some(Commands::Create {
            name,
            ostype,
            register,
            basefolder,
            uuid,
        }) => cmd_create(
            &backend,
            CreateVmOptions {
                name,
                ostype,
                register,
                basefolder,
                uuid,
            },
        ),
        Some(Commands::Register { file }) => cmd_register(&backend, &file),
        Some(Commands::Unregister { vm, uuid, delete }) => {
            cmd_unregister(&backend, &vm, uuid, delete)
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
