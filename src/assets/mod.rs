/// Image decode/encode at the premultiplied RGBA8 boundary.
pub mod decode;
