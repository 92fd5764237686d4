use chat_client::input::{parse_line, Command, HELP_TEXT};
use chat_client::network::ChatClient;
use chat_client::rendering::render_packet;
use chat_shared::WireFormat;
use clap::Parser;
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Display name in the room
    #[arg(short = 'u', long)]
    username: String,

    /// Room to join
    #[arg(short = 'r', long)]
    room: String,

    /// Send bincode binary frames instead of JSON text
    #[arg(short = 'b', long)]
    binary: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let format = if args.binary {
        WireFormat::Bincode
    } else {
        WireFormat::Json
    };

    info!("Connecting to: {}", args.server);
    let mut client = ChatClient::connect(&args.server, format).await?;

    let ack = client.join(&args.username, &args.room).await?;
    let (outcome, backlog) = client.wait_for_ack(ack).await?;
    if let Err(reason) = outcome {
        eprintln!("Could not join {}: {}", args.room, reason);
        return Ok(());
    }
    for packet in &backlog {
        if let Some(line) = render_packet(packet) {
            println!("{}", line);
        }
    }
    println!("Type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            packet = client.next_packet() => {
                match packet {
                    Ok(Some(packet)) => {
                        if let Some(line) = render_packet(&packet) {
                            println!("{}", line);
                        }
                    }
                    Ok(None) => {
                        println!("Disconnected by server");
                        return Ok(());
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        return Err(e.into());
                    }
                }
            },

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                match parse_line(&line) {
                    Ok(Some(Command::Event(event))) => {
                        client.send(event).await?;
                    }
                    Ok(Some(Command::Help)) => println!("{}", HELP_TEXT),
                    Ok(Some(Command::Quit)) => break,
                    Ok(None) => {}
                    Err(e) => println!("! {}", e),
                }
            },
        }
    }

    client.close().await?;
    Ok(())
}
