use std::env;
use std::fs::OpenOptions;

use fmod::fs::volume::Fat32Volume;
use fmod::shell;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        println!("usage: fmod <FAT32 Image>");
        return;
    }

    let image = match OpenOptions::new().read(true).write(true).open(&args[1]) {
        Ok(file) => file,
        Err(_) => {
            println!("error: failed to open {}.", args[1]);
            return;
        }
    };

    let mut volume = match Fat32Volume::open(image) {
        Ok(volume) => volume,
        Err(e) => {
            println!("error: {e}");
            return;
        }
    };

    if let Err(e) = shell::run(&mut volume) {
        eprintln!("error: {e}");
    }

    println!("\nClosing fmod.");
}
