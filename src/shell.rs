//! The interactive shell: prompt, tokenizer, dispatch.
//!
//! Deliberately mechanical. Arity and number parsing are handled here;
//! everything the commands actually do lives in `fs::volume`.

use std::io::{self, BufRead, Read, Seek, Write};

use anyhow::Result;

use crate::error::FatError;
use crate::fs::volume::Fat32Volume;

/// Run the prompt loop until `exit` or end of input.
pub fn run<D: Read + Write + Seek>(volume: &mut Fat32Volume<D>) -> Result<()> {
    let user = login_name();
    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        print!("{user}[{}]> ", volume.current_path());
        io::stdout().flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let tokens: Vec<&str> = input.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens[0] == "exit" {
            break;
        }

        match dispatch(volume, &tokens) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => println!("error: {e}"),
        }
    }

    Ok(())
}

fn dispatch<D: Read + Write + Seek>(
    volume: &mut Fat32Volume<D>,
    tokens: &[&str],
) -> Result<(), FatError> {
    match tokens[0] {
        "fsinfo" => {
            if tokens.len() != 1 {
                return usage("fsinfo");
            }
            let info = volume.info();
            println!("Bytes per sector: {}", info.bytes_per_sector);
            println!("Sectors per cluster: {}", info.sectors_per_cluster);
            println!("Total sectors: {}", info.total_sectors);
            println!("Number of FATs: {}", info.num_fats);
            println!("Sectors per FAT: {}", info.fat_size);
            println!("Number of free sectors: {}", info.free_sectors);
            Ok(())
        }
        "open" => {
            if tokens.len() != 3 {
                return usage("open <file name> <mode>");
            }
            volume.open_file(tokens[1], tokens[2])
        }
        "close" => {
            if tokens.len() != 2 {
                return usage("close <file name>");
            }
            volume.close_file(tokens[1])
        }
        "create" => {
            if tokens.len() != 2 {
                return usage("create <file name>");
            }
            volume.create(tokens[1])
        }
        "read" => {
            let line = "read <file name> <start pos> <num bytes>";
            if tokens.len() != 4 {
                return usage(line);
            }
            let Some(start) = parse_u32(tokens[2], "start pos", line) else {
                return Ok(());
            };
            let Some(count) = parse_u32(tokens[3], "num bytes", line) else {
                return Ok(());
            };
            let data = volume.read_file(tokens[1], start, count)?;
            let mut out = io::stdout();
            out.write_all(&data)?;
            writeln!(out)?;
            Ok(())
        }
        "write" => {
            let line = "write <file name> <start pos> <quoted data>";
            if tokens.len() < 4 {
                return usage(line);
            }
            let Some(start) = parse_u32(tokens[2], "start pos", line) else {
                return Ok(());
            };
            // The data argument is assumed to be surrounded by quotes;
            // rejoin the tokens and strip them without further checks.
            let joined = tokens[3..].join(" ");
            let data = joined.get(1..joined.len().saturating_sub(1)).unwrap_or("");
            volume.write_file(tokens[1], start, data.as_bytes())
        }
        "rm" => {
            if tokens.len() != 2 {
                return usage("rm <file name>");
            }
            volume.remove(tokens[1], false)
        }
        "srm" => {
            if tokens.len() != 2 {
                return usage("srm <file name>");
            }
            volume.remove(tokens[1], true)
        }
        "cd" => {
            if tokens.len() != 2 {
                return usage("cd <dir name>");
            }
            volume.change_directory(tokens[1])
        }
        "ls" => {
            if tokens.len() > 2 {
                return usage("ls [dir name]");
            }
            let names = volume.list(tokens.get(1).copied())?;
            let mut out = io::stdout();
            for name in &names {
                write!(out, "{name} ")?;
            }
            writeln!(out)?;
            Ok(())
        }
        "mkdir" => {
            if tokens.len() != 2 {
                return usage("mkdir <dir name>");
            }
            volume.make_directory(tokens[1])
        }
        "rmdir" => {
            if tokens.len() != 2 {
                return usage("rmdir <dir name>");
            }
            volume.remove_directory(tokens[1])
        }
        "size" => {
            if tokens.len() != 2 {
                return usage("size <file name>");
            }
            println!("{} bytes.", volume.size_of(tokens[1])?);
            Ok(())
        }
        _ => {
            println!("error: Invalid command, please try again.");
            Ok(())
        }
    }
}

fn usage(line: &str) -> Result<(), FatError> {
    println!("error: usage: {line}");
    Ok(())
}

/// Parse a decimal u32 argument. Prints its own diagnostic and returns
/// `None` when the token is not a number or does not fit.
fn parse_u32(text: &str, label: &str, usage_line: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        println!("error: usage: {usage_line}");
        return None;
    }
    match text.parse::<u32>() {
        Ok(value) => Some(value),
        Err(_) => {
            println!("{label} too large. Must be less than {}", u32::MAX);
            None
        }
    }
}

/// The session user for the prompt, from the OS login lookup.
fn login_name() -> String {
    #[cfg(unix)]
    {
        if let Ok(Some(user)) = nix::unistd::User::from_uid(nix::unistd::getuid()) {
            return user.name;
        }
    }
    std::env::var("USER").unwrap_or_else(|_| "user".to_string())
}
