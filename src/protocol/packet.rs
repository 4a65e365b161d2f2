use bytes::{BufMut, Bytes, BytesMut};

/// Capability flag for the 4.1 protocol (SQL state in ERR packets)
pub const CLIENT_PROTOCOL_41: u32 = 1 << 9;

/// `COM_QUERY` command byte
pub const COM_QUERY: u8 = 0x03;

/// MySQL error codes used by the routing layer
pub mod error_code {
    /// ER_NO_DB_ERROR
    pub const ER_NO_DB_ERROR: u16 = 1046;
    /// ER_PARSE_ERROR
    pub const ER_PARSE_ERROR: u16 = 1064;
    /// ER_UNKNOWN_ERROR
    pub const ER_UNKNOWN_ERROR: u16 = 1105;
}

/// MySQL wire protocol packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub sequence_id: u8,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(sequence_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_id,
            payload: payload.into(),
        }
    }

    /// Build a `COM_QUERY` packet carrying the given statement
    pub fn query(sql: &str) -> Self {
        let mut payload = BytesMut::with_capacity(sql.len() + 1);
        payload.put_u8(COM_QUERY);
        payload.extend_from_slice(sql.as_bytes());
        Self::new(0, payload.freeze())
    }

    pub fn is_err(&self) -> bool {
        self.payload.first() == Some(&0xFF)
    }

    pub fn is_ok(&self) -> bool {
        self.payload.first() == Some(&0x00)
    }
}

/// OK packet
#[derive(Debug, Clone, Default)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: u16,
    pub warnings: u16,
}

impl OkPacket {
    pub fn new() -> Self {
        Self {
            status_flags: 0x0002, // SERVER_STATUS_AUTOCOMMIT
            ..Default::default()
        }
    }

    pub fn encode(&self, sequence_id: u8, capabilities: u32) -> Packet {
        let mut buf = BytesMut::new();
        buf.put_u8(0x00);
        put_lenenc_int(&mut buf, self.affected_rows);
        put_lenenc_int(&mut buf, self.last_insert_id);
        if capabilities & CLIENT_PROTOCOL_41 != 0 {
            buf.put_u16_le(self.status_flags);
            buf.put_u16_le(self.warnings);
        }
        Packet::new(sequence_id, buf.freeze())
    }
}

/// ERR packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrPacket {
    pub error_code: u16,
    pub sql_state: String,
    pub error_message: String,
}

impl ErrPacket {
    pub fn new(error_code: u16, sql_state: &str, error_message: &str) -> Self {
        Self {
            error_code,
            sql_state: sql_state.to_string(),
            error_message: error_message.to_string(),
        }
    }

    pub fn encode(&self, sequence_id: u8, capabilities: u32) -> Packet {
        let mut buf = BytesMut::new();
        buf.put_u8(0xFF);
        buf.put_u16_le(self.error_code);

        if capabilities & CLIENT_PROTOCOL_41 != 0 {
            buf.put_u8(b'#');
            // SQL state is always exactly five bytes on the wire
            let mut state = [b'0'; 5];
            for (dst, src) in state.iter_mut().zip(self.sql_state.bytes()) {
                *dst = src;
            }
            buf.extend_from_slice(&state);
        }

        buf.extend_from_slice(self.error_message.as_bytes());
        Packet::new(sequence_id, buf.freeze())
    }

    /// Parse from packet payload
    pub fn parse(payload: &[u8], capabilities: u32) -> Option<Self> {
        if payload.len() < 3 || payload[0] != 0xFF {
            return None;
        }

        let error_code = u16::from_le_bytes([payload[1], payload[2]]);
        let rest = &payload[3..];

        let (sql_state, error_message) =
            if capabilities & CLIENT_PROTOCOL_41 != 0 && rest.len() >= 6 && rest[0] == b'#' {
                (
                    String::from_utf8_lossy(&rest[1..6]).to_string(),
                    String::from_utf8_lossy(&rest[6..]).to_string(),
                )
            } else {
                ("HY000".to_string(), String::from_utf8_lossy(rest).to_string())
            };

        Some(Self {
            error_code,
            sql_state,
            error_message,
        })
    }
}

fn put_lenenc_int(buf: &mut BytesMut, value: u64) {
    match value {
        0..=0xFA => buf.put_u8(value as u8),
        0xFB..=0xFFFF => {
            buf.put_u8(0xFC);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..=0xFF_FFFF => {
            buf.put_u8(0xFD);
            buf.put_uint_le(value, 3);
        }
        _ => {
            buf.put_u8(0xFE);
            buf.put_u64_le(value);
        }
    }
}
