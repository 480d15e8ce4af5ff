pub mod block_buffer;
pub mod block_device;
pub mod byte_order;
pub mod context;
pub mod host_block_device;
pub mod wgpu_block_device;
