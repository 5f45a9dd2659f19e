//! Thin terminal chat client
//!
//! Speaks the line protocol and nothing more: sends the handshake,
//! forwards stdin lines to the server, and prints every envelope line
//! the server delivers. Exit with EOF (Ctrl-D) or when the server
//! closes the connection.

use std::env;
use std::error::Error;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::process;
use std::thread;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: {} <addr> <username> [room ...]", args[0]);
        eprintln!("example: {} 127.0.0.1:8080 alice general random", args[0]);
        process::exit(2);
    }
    let addr = &args[1];
    let username = &args[2];
    let rooms = &args[3..];

    let mut stream = TcpStream::connect(addr)?;
    println!("Connected to {}.", addr);

    // Handshake: username|room1|room2|...
    let mut handshake = username.clone();
    for room in rooms {
        handshake.push('|');
        handshake.push_str(room);
    }
    handshake.push('\n');
    stream.write_all(handshake.as_bytes())?;

    // Print envelope lines as they arrive
    let incoming = stream.try_clone()?;
    let printer = thread::spawn(move || {
        let reader = BufReader::new(incoming);
        for line in reader.lines() {
            match line {
                Ok(line) => println!("{}", line),
                Err(_) => break,
            }
        }
        println!("Server closed the connection.");
    });

    // Forward stdin lines until EOF
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
    }

    stream.shutdown(Shutdown::Write)?;
    let _ = printer.join();
    Ok(())
}
