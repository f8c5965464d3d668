#![allow(dead_code)]

use std::path::Path;

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

pub const FRONT_LEFT: &str = "/vehicle_8/camera/front_left/image/compressed";
pub const REAR_LEFT: &str = "/vehicle_8/camera/rear_left/image/compressed";
pub const FRONT_LEFT_RAW: &str = "/vehicle_8/camera/front_left/image";

/// In-memory description of a ROS 2 bag, written out as a `.db3` file.
#[derive(Default)]
pub struct BagFixture {
    topics: Vec<(i64, String, String)>,
    messages: Vec<(i64, i64, Vec<u8>)>,
    no_timestamp_column: bool,
}

impl BagFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(mut self, id: i64, name: &str) -> Self {
        let ty = if name.ends_with("compressed") {
            "sensor_msgs/msg/CompressedImage"
        } else {
            "sensor_msgs/msg/Image"
        };
        self.topics.push((id, name.to_string(), ty.to_string()));
        self
    }

    pub fn message(mut self, topic_id: i64, payload: Vec<u8>) -> Self {
        let ts = 1_700_000_000_000_000_000 + self.messages.len() as i64 * 50_000_000;
        self.messages.push((topic_id, ts, payload));
        self
    }

    /// Write a `messages` table without its `timestamp` column, so header
    /// queries fail while the catalog and counts still work.
    pub fn without_timestamp_column(mut self) -> Self {
        self.no_timestamp_column = true;
        self
    }

    pub fn write(&self, path: &Path) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut conn = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .connect()
                .await
                .unwrap();
            sqlx::query(
                "CREATE TABLE topics (id INTEGER PRIMARY KEY, name TEXT NOT NULL, type TEXT NOT NULL, \
                 serialization_format TEXT NOT NULL, offered_qos_profiles TEXT NOT NULL)",
            )
            .execute(&mut conn)
            .await
            .unwrap();
            let messages_table = if self.no_timestamp_column {
                "CREATE TABLE messages (id INTEGER PRIMARY KEY, topic_id INTEGER NOT NULL, \
                 stamp INTEGER NOT NULL, data BLOB NOT NULL)"
            } else {
                "CREATE TABLE messages (id INTEGER PRIMARY KEY, topic_id INTEGER NOT NULL, \
                 timestamp INTEGER NOT NULL, data BLOB NOT NULL)"
            };
            sqlx::query(messages_table).execute(&mut conn).await.unwrap();
            for (id, name, ty) in &self.topics {
                sqlx::query("INSERT INTO topics VALUES (?, ?, ?, 'cdr', '')")
                    .bind(id)
                    .bind(name)
                    .bind(ty)
                    .execute(&mut conn)
                    .await
                    .unwrap();
            }
            for (topic_id, ts, data) in &self.messages {
                sqlx::query("INSERT INTO messages VALUES (NULL, ?, ?, ?)")
                    .bind(topic_id)
                    .bind(ts)
                    .bind(data.as_slice())
                    .execute(&mut conn)
                    .await
                    .unwrap();
            }
            conn.close().await.unwrap();
        });
    }
}

pub fn jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let pixels: Vec<u8> = rgb.iter().copied().cycle().take((width * height * 3) as usize).collect();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode(&pixels, width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// CDR-serialized `sensor_msgs/CompressedImage` wrapping `jpeg`.
pub fn compressed_payload(jpeg: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x00, 0x01, 0x00, 0x00];
    payload.extend_from_slice(&12u32.to_le_bytes());
    payload.extend_from_slice(&34u32.to_le_bytes());
    payload.extend_from_slice(&4u32.to_le_bytes());
    payload.extend_from_slice(b"cam\0");
    payload.extend_from_slice(&5u32.to_le_bytes());
    payload.extend_from_slice(b"jpeg\0\0\0\0");
    payload.extend_from_slice(&(jpeg.len() as u32).to_le_bytes());
    payload.extend_from_slice(jpeg);
    payload
}

pub fn frame_payload() -> Vec<u8> {
    compressed_payload(&jpeg(8, 6, [200, 40, 20]))
}

/// Raw `bgr8` payload for a `width`x`height` frame.
pub fn raw_payload(width: u32, height: u32) -> Vec<u8> {
    let mut payload = b"\x00\x01\x00\x00encoding=bgr".to_vec();
    payload.extend((0..width * height * 3).map(|i| (i % 251) as u8));
    payload
}
