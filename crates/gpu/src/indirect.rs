use bytemuck::{Pod, Zeroable};

/// Parameters of one indexed indirect draw, as read by the GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawElementsIndirectCommand {
    pub count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub base_instance: u32,
}

/// Parameters of one non-indexed indirect draw, as read by the GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawArraysIndirectCommand {
    pub count: u32,
    pub instance_count: u32,
    pub first: u32,
    pub base_instance: u32,
}

/// Either indirect command variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectCommand {
    Elements(DrawElementsIndirectCommand),
    Arrays(DrawArraysIndirectCommand),
}

impl IndirectCommand {
    pub const ELEMENTS_SIZE: usize = std::mem::size_of::<DrawElementsIndirectCommand>();
    pub const ARRAYS_SIZE: usize = std::mem::size_of::<DrawArraysIndirectCommand>();

    pub fn byte_size(&self) -> usize {
        match self {
            Self::Elements(_) => Self::ELEMENTS_SIZE,
            Self::Arrays(_) => Self::ARRAYS_SIZE,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Elements(cmd) => bytemuck::bytes_of(cmd),
            Self::Arrays(cmd) => bytemuck::bytes_of(cmd),
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Elements(_))
    }

    pub fn instance_count(&self) -> u32 {
        match self {
            Self::Elements(cmd) => cmd.instance_count,
            Self::Arrays(cmd) => cmd.instance_count,
        }
    }

    /// Decode an indexed command from `bytes` at `offset`.
    pub fn read_elements(bytes: &[u8], offset: usize) -> Option<DrawElementsIndirectCommand> {
        let slice = bytes.get(offset..offset + Self::ELEMENTS_SIZE)?;
        Some(bytemuck::pod_read_unaligned(slice))
    }

    /// Decode a non-indexed command from `bytes` at `offset`.
    pub fn read_arrays(bytes: &[u8], offset: usize) -> Option<DrawArraysIndirectCommand> {
        let slice = bytes.get(offset..offset + Self::ARRAYS_SIZE)?;
        Some(bytemuck::pod_read_unaligned(slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_sizes_match_gpu_layout() {
        assert_eq!(IndirectCommand::ELEMENTS_SIZE, 20);
        assert_eq!(IndirectCommand::ARRAYS_SIZE, 16);
    }

    #[test]
    fn decode_at_offset() {
        let arrays = IndirectCommand::Arrays(DrawArraysIndirectCommand {
            count: 3,
            instance_count: 1,
            first: 0,
            base_instance: 0,
        });
        let elements = DrawElementsIndirectCommand {
            count: 36,
            instance_count: 2,
            first_index: 6,
            base_vertex: 4,
            base_instance: 1,
        };
        let mut bytes = arrays.as_bytes().to_vec();
        bytes.extend_from_slice(IndirectCommand::Elements(elements).as_bytes());

        assert_eq!(
            IndirectCommand::read_elements(&bytes, IndirectCommand::ARRAYS_SIZE),
            Some(elements)
        );
        assert!(IndirectCommand::read_elements(&bytes, 20).is_none());
    }
}
