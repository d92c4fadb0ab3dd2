use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("could not read downloaded file: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is too short to be an executable")]
    Truncated,
    #[error("unrecognized executable format")]
    UnknownFormat,
    #[error("corrupt {0} header")]
    Corrupt(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableFormat {
    Elf,
    MachO,
    Pe,
}

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const MACHO_MAGICS: [[u8; 4]; 4] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xcf, 0xfa, 0xed, 0xfe],
];
const FAT_MAGIC: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];
// Java class files share the fat magic; a real universal binary has few slices.
const MAX_FAT_ARCHS: u32 = 32;

/// Open `path` and check that it starts with a well-formed native executable
/// header. Nothing beyond the header is interpreted.
pub fn verify_executable(path: &Path) -> Result<ExecutableFormat, ArchiveError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let mut header = [0u8; 64];
    let read = read_up_to(&mut file, &mut header)?;
    let header = &header[..read];
    if header.len() < 4 {
        return Err(ArchiveError::Truncated);
    }
    let magic = [header[0], header[1], header[2], header[3]];

    if magic == ELF_MAGIC {
        check_elf(header)?;
        return Ok(ExecutableFormat::Elf);
    }
    if MACHO_MAGICS.contains(&magic) {
        if header.len() < 28 {
            return Err(ArchiveError::Truncated);
        }
        return Ok(ExecutableFormat::MachO);
    }
    if magic == FAT_MAGIC {
        if header.len() < 8 {
            return Err(ArchiveError::Truncated);
        }
        let archs = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if archs == 0 || archs > MAX_FAT_ARCHS {
            return Err(ArchiveError::Corrupt("Mach-O universal"));
        }
        return Ok(ExecutableFormat::MachO);
    }
    if header.starts_with(b"MZ") {
        check_pe(&mut file, header, len)?;
        return Ok(ExecutableFormat::Pe);
    }
    Err(ArchiveError::UnknownFormat)
}

fn check_elf(header: &[u8]) -> Result<(), ArchiveError> {
    if header.len() < 16 {
        return Err(ArchiveError::Truncated);
    }
    let (class, data, version) = (header[4], header[5], header[6]);
    let min_len = match class {
        1 => 52,
        2 => 64,
        _ => return Err(ArchiveError::Corrupt("ELF")),
    };
    if !matches!(data, 1 | 2) || version != 1 {
        return Err(ArchiveError::Corrupt("ELF"));
    }
    if header.len() < min_len {
        return Err(ArchiveError::Truncated);
    }
    Ok(())
}

fn check_pe(file: &mut File, header: &[u8], len: u64) -> Result<(), ArchiveError> {
    if header.len() < 64 {
        return Err(ArchiveError::Truncated);
    }
    let offset = u32::from_le_bytes([header[0x3c], header[0x3d], header[0x3e], header[0x3f]]);
    let offset = u64::from(offset);
    if offset + 4 > len {
        return Err(ArchiveError::Corrupt("PE"));
    }
    file.seek(SeekFrom::Start(offset))?;
    let mut signature = [0u8; 4];
    file.read_exact(&mut signature)?;
    if signature != *b"PE\0\0" {
        return Err(ArchiveError::Corrupt("PE"));
    }
    Ok(())
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Minimal 64-bit little-endian ELF header.
    pub(crate) fn elf_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; 128];
        bytes[..4].copy_from_slice(&ELF_MAGIC);
        bytes[4] = 2;
        bytes[5] = 1;
        bytes[6] = 1;
        bytes
    }

    fn check(bytes: &[u8]) -> Result<ExecutableFormat, ArchiveError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("candidate");
        std::fs::write(&path, bytes).unwrap();
        verify_executable(&path)
    }

    #[test]
    fn accepts_elf() {
        assert_eq!(check(&elf_bytes()).unwrap(), ExecutableFormat::Elf);
    }

    #[test]
    fn rejects_elf_with_bad_class() {
        let mut bytes = elf_bytes();
        bytes[4] = 7;
        assert!(matches!(check(&bytes), Err(ArchiveError::Corrupt("ELF"))));
    }

    #[test]
    fn rejects_truncated_elf() {
        assert!(matches!(check(&elf_bytes()[..20]), Err(ArchiveError::Truncated)));
    }

    #[test]
    fn accepts_thin_macho() {
        let mut bytes = vec![0u8; 32];
        bytes[..4].copy_from_slice(&[0xcf, 0xfa, 0xed, 0xfe]);
        assert_eq!(check(&bytes).unwrap(), ExecutableFormat::MachO);
    }

    #[test]
    fn fat_magic_needs_plausible_arch_count() {
        let mut bytes = vec![0u8; 32];
        bytes[..4].copy_from_slice(&FAT_MAGIC);
        bytes[7] = 2;
        assert_eq!(check(&bytes).unwrap(), ExecutableFormat::MachO);

        // Java class file, major version 52
        bytes[4..8].copy_from_slice(&[0, 0, 0, 52]);
        assert!(matches!(check(&bytes), Err(ArchiveError::Corrupt(_))));
    }

    #[test]
    fn accepts_pe_with_signature() {
        let mut bytes = vec![0u8; 256];
        bytes[..2].copy_from_slice(b"MZ");
        bytes[0x3c] = 0x80;
        bytes[0x80..0x84].copy_from_slice(b"PE\0\0");
        assert_eq!(check(&bytes).unwrap(), ExecutableFormat::Pe);

        bytes[0x80] = b'X';
        assert!(matches!(check(&bytes), Err(ArchiveError::Corrupt("PE"))));
    }

    #[test]
    fn rejects_html_error_page() {
        let err = check(b"<html><body>502 Bad Gateway</body></html>").unwrap_err();
        assert!(matches!(err, ArchiveError::UnknownFormat));
    }

    #[test]
    fn rejects_empty_file() {
        assert!(matches!(check(b""), Err(ArchiveError::Truncated)));
    }
}
