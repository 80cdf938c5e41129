//! Implementations of Writer and Writeable for the types our messages
//! are built from.

use super::*;

/// Vec<u8> is the main type that implements Writer.
impl Writer for Vec<u8> {
    fn write_all(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
    fn write_u8(&mut self, byte: u8) {
        // specialize for performance
        self.push(byte);
    }
}

impl Writeable for [u8] {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
        b.write_all(self)
    }
}

impl Writeable for Vec<u8> {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
        b.write_all(&self[..])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writeable_slices() {
        let mut w: Vec<u8> = Vec::new();
        w.write_u8(0x05);
        w.write(&[0x01_u8, 0x00][..]);
        w.write(&vec![0x03_u8, 0x04]);
        w.write_u16(8080);
        assert_eq!(w, &[0x05, 0x01, 0x00, 0x03, 0x04, 0x1f, 0x90]);
    }
}
