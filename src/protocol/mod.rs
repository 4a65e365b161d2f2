pub mod packet;

pub use packet::{error_code, ErrPacket, OkPacket, Packet, CLIENT_PROTOCOL_41, COM_QUERY};
