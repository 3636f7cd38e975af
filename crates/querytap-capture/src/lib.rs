mod replay;

pub use replay::ReplayPacketSource;
