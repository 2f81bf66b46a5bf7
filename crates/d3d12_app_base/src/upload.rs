//! Layout rules for staging data that the copy engine reads.

use eyre::bail;
use eyre::ensure;

/// `D3D12_TEXTURE_DATA_PITCH_ALIGNMENT`: each texture row in a staging buffer starts on this boundary.
pub const TEXTURE_PITCH_ALIGNMENT: u32 = 256;

/// `D3D12_CONSTANT_BUFFER_DATA_PLACEMENT_ALIGNMENT`: constant buffer views must be sized in these steps.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Rounds `value` up to a power-of-two `alignment`.
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

pub fn constant_buffer_size(size: u64) -> u64 {
    align_up(size.max(1), CONSTANT_BUFFER_ALIGNMENT)
}

/// Where the rows of a single 2D subresource live inside a staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureFootprint {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub row_pitch: u32,
}

impl TextureFootprint {
    pub fn new(width: u32, height: u32, bytes_per_pixel: u32) -> eyre::Result<Self> {
        if width == 0 || height == 0 || bytes_per_pixel == 0 {
            bail!("texture footprint needs non-zero extents, got {width}x{height}x{bytes_per_pixel}");
        }
        let row_size = u64::from(width) * u64::from(bytes_per_pixel);
        let row_pitch = align_up(row_size, u64::from(TEXTURE_PITCH_ALIGNMENT));
        let row_pitch = u32::try_from(row_pitch)?;
        Ok(Self {
            width,
            height,
            bytes_per_pixel,
            row_pitch,
        })
    }

    /// Bytes of pixel data in one row, without padding.
    pub fn row_size(&self) -> usize {
        self.width as usize * self.bytes_per_pixel as usize
    }

    /// Size of the tightly packed source image.
    pub fn source_size(&self) -> usize {
        self.row_size() * self.height as usize
    }

    /// Staging buffer bytes needed for the pitched copy.
    pub fn staging_size(&self) -> u64 {
        u64::from(self.row_pitch) * u64::from(self.height)
    }

    /// Copies tightly packed rows into `staging`, one row per `row_pitch`.
    pub fn copy_rows(&self, source: &[u8], staging: &mut [u8]) -> eyre::Result<()> {
        ensure!(
            source.len() == self.source_size(),
            "source has {} bytes, expected {}",
            source.len(),
            self.source_size()
        );
        ensure!(
            staging.len() as u64 >= self.staging_size(),
            "staging buffer has {} bytes, needs {}",
            staging.len(),
            self.staging_size()
        );

        let row_size = self.row_size();
        let pitch = self.row_pitch as usize;
        for (y, row) in source.chunks_exact(row_size).enumerate() {
            let start = y * pitch;
            staging[start..start + row_size].copy_from_slice(row);
        }
        Ok(())
    }
}
