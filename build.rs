// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("equo")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Entropy Contributors")
        .about("Entropy package matching and cache maintenance")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .default_value("/etc/entropy/equo.toml")
                .help("Settings file"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Only print errors"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print debugging output"),
        )
        .subcommand(
            Command::new("init")
                .about("Create an empty repository database")
                .arg(Arg::new("id").required(true).help("Repository identifier"))
                .arg(Arg::new("db_path").required(true).help("Database path")),
        )
        .subcommand(
            Command::new("import")
                .about("Load a JSON repository index into a repository database")
                .arg(Arg::new("id").required(true).help("Repository identifier"))
                .arg(Arg::new("db_path").required(true).help("Database path (created when missing)"))
                .arg(Arg::new("index").required(true).help("Index file")),
        )
        .subcommand(
            Command::new("match")
                .about("Resolve a dependency string")
                .arg(Arg::new("atom").required(true).help("Atom or \"or\" dependency"))
                .arg(
                    Arg::new("multi")
                        .short('m')
                        .long("multi")
                        .action(ArgAction::SetTrue)
                        .help("Print every match instead of the best one"),
                )
                .arg(
                    Arg::new("installed")
                        .short('i')
                        .long("installed")
                        .action(ArgAction::SetTrue)
                        .help("Match against installed packages"),
                )
                .arg(
                    Arg::new("repo")
                        .short('r')
                        .long("repo")
                        .action(ArgAction::Append)
                        .help("Restrict to these repositories, in this order"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Fail on ambiguous package names"),
                )
                .arg(
                    Arg::new("lenient")
                        .long("lenient")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("strict")
                        .help("Pick the first key for ambiguous package names"),
                )
                .arg(
                    Arg::new("tagged")
                        .long("tagged")
                        .action(ArgAction::SetTrue)
                        .help("Let tagged packages match atoms without a tag"),
                )
                .arg(
                    Arg::new("no_cache")
                        .long("no-cache")
                        .action(ArgAction::SetTrue)
                        .help("Bypass the match cache"),
                )
                .arg(
                    Arg::new("no_mask")
                        .long("no-mask")
                        .action(ArgAction::SetTrue)
                        .help("Ignore package_mask"),
                )
                .arg(
                    Arg::new("selection")
                        .long("selection")
                        .value_parser(["priority", "newest"])
                        .help("Cross-repository selection policy"),
                ),
        )
        .subcommand(
            Command::new("belongs")
                .about("Find the packages owning a file")
                .arg(Arg::new("path").required(true))
                .arg(
                    Arg::new("installed")
                        .short('i')
                        .long("installed")
                        .action(ArgAction::SetTrue)
                        .help("Search installed packages"),
                ),
        )
        .subcommand(
            Command::new("library")
                .about("Find the packages providing a shared library")
                .arg(Arg::new("soname").required(true).help("Soname, e.g. libz.so.1"))
                .arg(
                    Arg::new("arch")
                        .short('a')
                        .long("arch")
                        .required(true)
                        .help("ELF class of the library"),
                )
                .arg(
                    Arg::new("installed")
                        .short('i')
                        .long("installed")
                        .action(ArgAction::SetTrue)
                        .help("Search installed packages"),
                ),
        )
        .subcommand(
            Command::new("cache")
                .about("Maintain the match cache")
                .subcommand_required(true)
                .subcommand(Command::new("generate").about("Rebuild the cache for every enabled repository"))
                .subcommand(Command::new("clean").about("Remove every cache entry")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("equo.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
