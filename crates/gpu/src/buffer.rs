use std::ops::Range;

use bytemuck::Pod;

use crate::device::{BufferHandle, BufferTarget, GraphicsDevice, MapAccess};
use crate::error::GpuError;

/// CPU-visible window onto a mapped buffer.
#[derive(Debug)]
struct Mapping {
    access: MapAccess,
    bytes: Vec<u8>,
    dirty: Option<Range<usize>>,
}

/// Device buffer with an allocate / map / write / unmap protocol.
///
/// `size` is the allocated capacity in bytes; `count` is the number of
/// elements written since the last allocation. The two diverge on purpose so
/// a buffer can be sized up front and filled afterwards.
///
/// Writes land in a CPU staging copy while mapped and only the dirty byte
/// range is flushed to the device on unmap.
#[derive(Debug)]
pub struct GpuBuffer {
    handle: BufferHandle,
    target: BufferTarget,
    size: usize,
    count: usize,
    cursor: usize,
    mapping: Option<Mapping>,
    live: bool,
}

impl GpuBuffer {
    pub fn new(device: &mut dyn GraphicsDevice, target: BufferTarget, label: &str) -> Self {
        let handle = device.create_buffer(target, label);
        Self {
            handle,
            target,
            size: 0,
            count: 0,
            cursor: 0,
            mapping: None,
            live: true,
        }
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Allocated capacity in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Elements written since the last allocation.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Byte offset of the next sequential write.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Reserve `size` bytes, invalidating the previous contents.
    pub fn allocate(&mut self, device: &mut dyn GraphicsDevice, size: usize) -> Result<(), GpuError> {
        if self.mapping.take().is_some() {
            tracing::warn!(buffer = ?self.handle, "allocating a mapped buffer, dropping the mapping");
        }
        device.allocate_buffer(self.handle, size)?;
        self.size = size;
        self.count = 0;
        self.cursor = 0;
        Ok(())
    }

    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.bind_buffer(self.handle);
    }

    /// Open the CPU window onto the buffer. Mapping is exclusive.
    pub fn map_memory(
        &mut self,
        device: &mut dyn GraphicsDevice,
        access: MapAccess,
    ) -> Result<(), GpuError> {
        if self.mapping.is_some() {
            return Err(GpuError::AlreadyMapped(self.handle));
        }
        let bytes = if access.can_read() {
            let mut bytes = device.read_buffer(self.handle)?;
            bytes.resize(self.size, 0);
            bytes
        } else {
            vec![0; self.size]
        };
        self.mapping = Some(Mapping {
            access,
            bytes,
            dirty: None,
        });
        Ok(())
    }

    /// Close the CPU window, flushing written bytes to the device.
    pub fn unmap_memory(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), GpuError> {
        let Some(mapping) = self.mapping.take() else {
            tracing::error!(buffer = ?self.handle, "unmap of a buffer that is not mapped");
            return Ok(());
        };
        if let Some(dirty) = mapping.dirty {
            device.write_buffer(self.handle, dirty.start, &mapping.bytes[dirty])?;
        }
        Ok(())
    }

    /// Copy `data` into mapped memory and add `count` to the element count.
    ///
    /// Without an explicit `offset` the bytes go to the write cursor, which
    /// then advances past them. With an offset the cursor is left alone.
    pub fn load_data_in_mapped_memory(&mut self, data: &[u8], count: usize, offset: Option<usize>) {
        let Some(mapping) = self.mapping.as_mut() else {
            tracing::error!(buffer = ?self.handle, "write to a buffer that is not mapped");
            return;
        };
        if !mapping.access.can_write() {
            tracing::error!(buffer = ?self.handle, "write to a buffer mapped read-only");
            return;
        }
        let start = offset.unwrap_or(self.cursor);
        let end = start + data.len();
        if end > mapping.bytes.len() {
            tracing::error!(
                buffer = ?self.handle,
                offset = start,
                len = data.len(),
                size = mapping.bytes.len(),
                "write past the end of the buffer"
            );
            return;
        }
        mapping.bytes[start..end].copy_from_slice(data);
        if !data.is_empty() {
            mapping.dirty = Some(match mapping.dirty.take() {
                Some(d) => d.start.min(start)..d.end.max(end),
                None => start..end,
            });
        }
        if offset.is_none() {
            self.cursor = end;
        }
        self.count += count;
    }

    /// Typed convenience over [`Self::load_data_in_mapped_memory`]; one element per item.
    pub fn load<T: Pod>(&mut self, data: &[T], offset: Option<usize>) {
        self.load_data_in_mapped_memory(bytemuck::cast_slice(data), data.len(), offset);
    }

    /// The mapped bytes, or `None` outside the map window.
    pub fn mapped_memory(&self) -> Option<&[u8]> {
        match &self.mapping {
            Some(mapping) if mapping.access.can_read() => Some(&mapping.bytes),
            Some(_) => {
                tracing::error!(buffer = ?self.handle, "read from a buffer mapped write-only");
                None
            }
            None => {
                tracing::error!(buffer = ?self.handle, "read from a buffer that is not mapped");
                None
            }
        }
    }

    /// Unbind, then free the device storage.
    pub fn destroy(mut self, device: &mut dyn GraphicsDevice) {
        device.unbind_buffer(self.target);
        device.destroy_buffer(self.handle);
        self.live = false;
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if self.live {
            tracing::warn!(buffer = ?self.handle, "GpuBuffer dropped without destroy, device storage leaked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;
    use ember_common::Vertex;

    fn vertices() -> Vec<Vertex> {
        vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ]
    }

    #[test]
    fn size_is_capacity_count_is_occupancy() {
        let mut device = HeadlessDevice::new();
        let mut buffer = GpuBuffer::new(&mut device, BufferTarget::Index, "indices");
        buffer.allocate(&mut device, 64).unwrap();
        buffer.map_memory(&mut device, MapAccess::WriteOnly).unwrap();
        buffer.load(&[0u32, 1, 2], None);
        buffer.unmap_memory(&mut device).unwrap();

        assert_eq!(buffer.size(), 64);
        assert_eq!(buffer.count(), 3);
        assert_eq!(buffer.cursor(), 12);
        buffer.destroy(&mut device);
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let mut device = HeadlessDevice::new();
        let source = vertices();
        let indices = [0u32, 1, 2];
        let mut vbo = GpuBuffer::new(&mut device, BufferTarget::Vertex, "vertices");
        let mut ibo = GpuBuffer::new(&mut device, BufferTarget::Index, "indices");
        vbo.allocate(&mut device, std::mem::size_of_val(source.as_slice())).unwrap();
        ibo.allocate(&mut device, 12).unwrap();

        vbo.map_memory(&mut device, MapAccess::WriteOnly).unwrap();
        ibo.map_memory(&mut device, MapAccess::WriteOnly).unwrap();
        vbo.load(&source, None);
        ibo.load(&indices, None);
        vbo.unmap_memory(&mut device).unwrap();
        ibo.unmap_memory(&mut device).unwrap();

        vbo.map_memory(&mut device, MapAccess::ReadOnly).unwrap();
        ibo.map_memory(&mut device, MapAccess::ReadOnly).unwrap();
        assert_eq!(vbo.mapped_memory().unwrap(), bytemuck::cast_slice::<Vertex, u8>(&source));
        assert_eq!(ibo.mapped_memory().unwrap(), bytemuck::cast_slice::<u32, u8>(&indices));
        vbo.unmap_memory(&mut device).unwrap();
        ibo.unmap_memory(&mut device).unwrap();

        vbo.destroy(&mut device);
        ibo.destroy(&mut device);
    }

    #[test]
    fn write_outside_map_window_is_skipped() {
        let mut device = HeadlessDevice::new();
        let mut buffer = GpuBuffer::new(&mut device, BufferTarget::Vertex, "v");
        buffer.allocate(&mut device, 16).unwrap();
        buffer.load(&[1.0f32, 2.0], None);
        assert_eq!(buffer.count(), 0);
        assert_eq!(buffer.cursor(), 0);
        assert!(buffer.mapped_memory().is_none());
        assert_eq!(device.buffer_data(buffer.handle()).unwrap(), &[0u8; 16]);
        buffer.destroy(&mut device);
    }

    #[test]
    fn explicit_offset_leaves_cursor() {
        let mut device = HeadlessDevice::new();
        let mut buffer = GpuBuffer::new(&mut device, BufferTarget::Vertex, "v");
        buffer.allocate(&mut device, 16).unwrap();
        buffer.map_memory(&mut device, MapAccess::ReadWrite).unwrap();
        buffer.load(&[7u32], Some(8));
        assert_eq!(buffer.cursor(), 0);
        buffer.load(&[1u32], None);
        assert_eq!(buffer.cursor(), 4);
        assert_eq!(buffer.count(), 2);
        buffer.unmap_memory(&mut device).unwrap();

        let data = device.buffer_data(buffer.handle()).unwrap();
        assert_eq!(&data[8..12], &7u32.to_ne_bytes());
        assert_eq!(&data[0..4], &1u32.to_ne_bytes());
        buffer.destroy(&mut device);
    }

    #[test]
    fn write_past_capacity_is_skipped() {
        let mut device = HeadlessDevice::new();
        let mut buffer = GpuBuffer::new(&mut device, BufferTarget::Index, "i");
        buffer.allocate(&mut device, 8).unwrap();
        buffer.map_memory(&mut device, MapAccess::WriteOnly).unwrap();
        buffer.load(&[1u32, 2, 3], None);
        assert_eq!(buffer.count(), 0);
        buffer.unmap_memory(&mut device).unwrap();
        buffer.destroy(&mut device);
    }

    #[test]
    fn mapping_is_exclusive() {
        let mut device = HeadlessDevice::new();
        let mut buffer = GpuBuffer::new(&mut device, BufferTarget::Instance, "inst");
        buffer.allocate(&mut device, 4).unwrap();
        buffer.map_memory(&mut device, MapAccess::WriteOnly).unwrap();
        assert!(matches!(
            buffer.map_memory(&mut device, MapAccess::WriteOnly),
            Err(GpuError::AlreadyMapped(_))
        ));
        buffer.unmap_memory(&mut device).unwrap();
        buffer.destroy(&mut device);
    }

    #[test]
    fn reallocation_resets_count_and_cursor() {
        let mut device = HeadlessDevice::new();
        let mut buffer = GpuBuffer::new(&mut device, BufferTarget::Index, "i");
        buffer.allocate(&mut device, 8).unwrap();
        buffer.map_memory(&mut device, MapAccess::WriteOnly).unwrap();
        buffer.load(&[1u32, 2], None);
        buffer.unmap_memory(&mut device).unwrap();

        buffer.allocate(&mut device, 32).unwrap();
        assert_eq!((buffer.size(), buffer.count(), buffer.cursor()), (32, 0, 0));
        buffer.destroy(&mut device);
    }

    #[test]
    fn destroy_frees_device_storage() {
        let mut device = HeadlessDevice::new();
        let mut buffer = GpuBuffer::new(&mut device, BufferTarget::Vertex, "v");
        buffer.allocate(&mut device, 32).unwrap();
        let handle = buffer.handle();
        buffer.destroy(&mut device);
        assert!(device.buffer(handle).is_none());
        assert_eq!(device.live_buffer_count(), 0);
    }

    #[test]
    fn failed_allocation_propagates() {
        let mut device = HeadlessDevice::with_memory_budget(16);
        let mut buffer = GpuBuffer::new(&mut device, BufferTarget::Vertex, "v");
        assert!(matches!(
            buffer.allocate(&mut device, 64),
            Err(GpuError::OutOfMemory { .. })
        ));
        assert_eq!(buffer.size(), 0);
        buffer.destroy(&mut device);
    }
}
