pub mod connection;
pub mod packet_type;
pub mod reliable_messenger;
pub mod stream_messenger;
