#[macro_use]
extern crate log;
extern crate chord_dht;
extern crate simplelog;

use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode};
use std::collections::HashMap;
use std::io;

use chord_dht::{Node, KEY_BITS};

fn main() {
    CombinedLogger::init(vec![TermLogger::new(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .unwrap();

    info!("Starting a demo ring on a {}-bit identifier space", KEY_BITS);

    let mut node_map: HashMap<u32, Node> = HashMap::new();
    let mut id = 0;
    for i in 0..4u32 {
        let bootstrap = if i == 0 {
            None
        } else {
            Some(node_map[&0].node_data())
        };
        match Node::new("127.0.0.1", "0", bootstrap) {
            Ok(node) => {
                node_map.insert(id, node);
                id += 1;
            },
            Err(err) => error!("Could not start node {}: {}", i, err),
        }
    }

    let input = io::stdin();

    loop {
        let mut buffer = String::new();
        println!("Ready for input! (new <idx> | put <idx> <key> <value> | get <idx> <key> | ring | fingers <idx> | leave <idx> | quit)");
        if input.read_line(&mut buffer).is_err() {
            break;
        }
        let args: Vec<&str> = buffer.trim_end().split(' ').collect();
        match args[0] {
            "new" => {
                let index: u32 = args[1].parse().unwrap();
                match Node::new("127.0.0.1", "0", Some(node_map[&index].node_data())) {
                    Ok(node) => {
                        node_map.insert(id, node);
                        id += 1;
                    },
                    Err(err) => error!("Could not start node: {}", err),
                }
            },
            "put" => {
                let index: u32 = args[1].parse().unwrap();
                match node_map[&index].put(args[2], args[3]) {
                    Ok(()) => println!("OK"),
                    Err(err) => error!("put failed: {}", err),
                }
            },
            "get" => {
                let index: u32 = args[1].parse().unwrap();
                match node_map[&index].get(args[2]) {
                    Ok(Some(value)) => println!("{}", value),
                    Ok(None) => println!("(not found)"),
                    Err(err) => error!("get failed: {}", err),
                }
            },
            "ring" => {
                for (index, node) in &node_map {
                    println!(
                        "{}: {:?} pred={:?} succ={:?} keys={}",
                        index,
                        node.node_data(),
                        node.predecessor(),
                        node.successor(),
                        node.storage_len(),
                    );
                }
            },
            "fingers" => {
                let index: u32 = args[1].parse().unwrap();
                for (row, entry) in node_map[&index].finger_entries().iter().enumerate() {
                    println!("{}: start={:?} node={:?}", row, entry.start, entry.node);
                }
            },
            "leave" => {
                let index: u32 = args[1].parse().unwrap();
                if let Some(node) = node_map.remove(&index) {
                    node.leave();
                }
            },
            "quit" => {
                for (_, node) in node_map.drain() {
                    node.leave();
                }
                break;
            },
            _ => println!("Unknown command."),
        }
    }
}
