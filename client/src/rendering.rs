use chat_shared::{ServerPacket, ADMIN_NAME};

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Formats a millisecond timestamp as a 12-hour UTC clock, e.g. `9:05 pm`
pub fn format_clock(timestamp_ms: u64) -> String {
    let minutes_today = (timestamp_ms % MS_PER_DAY) / 60_000;
    let hour = minutes_today / 60;
    let minute = minutes_today % 60;

    let suffix = if hour < 12 { "am" } else { "pm" };
    let hour12 = match hour % 12 {
        0 => 12,
        h => h,
    };

    format!("{}:{:02} {}", hour12, minute, suffix)
}

/// Renders a server packet as one terminal line
///
/// Successful acknowledgments produce nothing.
pub fn render_packet(packet: &ServerPacket) -> Option<String> {
    match packet {
        ServerPacket::Message(message) => {
            let time = format_clock(message.timestamp);
            if message.sender == ADMIN_NAME {
                Some(format!("{} * {}", time, message.text))
            } else {
                Some(format!("{} {}: {}", time, message.sender, message.text))
            }
        }
        ServerPacket::LocationMessage(location) => Some(format!(
            "{} {} shared a location: {}",
            format_clock(location.timestamp),
            location.sender,
            location.url
        )),
        ServerPacket::RoomData(data) => Some(format!(
            "-- room {} ({}): {} --",
            data.room,
            data.users.len(),
            data.usernames().join(", ")
        )),
        ServerPacket::Ack { error: Some(e), .. } => Some(format!("! {}", e)),
        ServerPacket::Ack { error: None, .. } => None,
    }
}
