// crates/kinoplay-media/src/lib.rs
//
// Everything that touches FFmpeg: the playback engine (queues, reader,
// decoders, refresh pump) and the stream-copy utilities. The host shell
// plugs in through the narrow traits in `sink`.

pub mod audio;
pub mod frame_queue;
pub mod helpers;
pub mod packet_queue;
pub mod player;
pub mod reader;
pub mod remux;
pub mod sink;
pub mod state;
pub mod stream;
pub mod video;
