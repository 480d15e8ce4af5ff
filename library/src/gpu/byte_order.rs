use crate::gpu::block_device::Endianness;
use crate::resource::parameter_kind::WORD_SIZE_BYTES;

/// Stores host-order words in the byte order the GPU reads.
pub fn write_words(destination: &mut [u8], words: &[u32], endianness: Endianness) {
    assert_eq!(destination.len(), words.len() * WORD_SIZE_BYTES, "destination size mismatch");
    for (target, word) in destination.chunks_exact_mut(WORD_SIZE_BYTES).zip(words.iter()) {
        let bytes = match endianness {
            Endianness::Little => word.to_le_bytes(),
            Endianness::Big => word.to_be_bytes(),
        };
        target.copy_from_slice(&bytes);
    }
}

/// Same as [`write_words`] for host-order words still held as raw bytes.
pub fn copy_words(destination: &mut [u8], source: &[u8], endianness: Endianness) {
    assert_eq!(destination.len(), source.len(), "destination size mismatch");
    assert_eq!(source.len() % WORD_SIZE_BYTES, 0, "source is not a whole number of words");
    if endianness == Endianness::HOST {
        destination.copy_from_slice(source);
        return;
    }
    for (target, word) in destination.chunks_exact_mut(WORD_SIZE_BYTES).zip(source.chunks_exact(WORD_SIZE_BYTES)) {
        target.copy_from_slice(word);
        target.reverse();
    }
}

#[must_use]
pub fn read_word(source: &[u8], endianness: Endianness) -> u32 {
    let bytes: [u8; WORD_SIZE_BYTES] = [source[0], source[1], source[2], source[3]];
    match endianness {
        Endianness::Little => u32::from_le_bytes(bytes),
        Endianness::Big => u32::from_be_bytes(bytes),
    }
}
