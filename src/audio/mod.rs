pub mod capture;
pub mod duration;
pub mod pcm;
pub mod playback;
pub mod processing;
pub mod virtual_device;
pub mod wav;
