/*++

Licensed under the Apache-2.0 license.

File Name:

    printer.rs

Abstract:

    File contains support routines and macros for boot diagnostics output.

--*/
use core::convert::Infallible;
use ufmt::{uDisplay, uWrite};

#[derive(Default)]
pub struct Printer;

impl uWrite for Printer {
    type Error = Infallible;

    /// Writes a string slice into this writer, returning whether the write succeeded.
    #[cfg(not(feature = "std"))]
    #[inline(never)]
    fn write_str(&mut self, _str: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Writes a string slice into this writer, returning whether the write succeeded.
    #[cfg(feature = "std")]
    fn write_str(&mut self, str: &str) -> Result<(), Self::Error> {
        print!("{str}");
        Ok(())
    }
}

#[macro_export]
macro_rules! cprintln {
    ($($tt:tt)*) => {{
        let _ = ufmt::uwriteln!(&mut $crate::printer::Printer::default(), $($tt)*);
    }}
}

/// Displays a byte slice as upper case hex
pub struct HexBytes<'a>(pub &'a [u8]);

impl uDisplay for HexBytes<'_> {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        for &x in self.0.iter() {
            f.write_char(DIGITS[(x >> 4) as usize] as char)?;
            f.write_char(DIGITS[(x & 0xf) as usize] as char)?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    struct Capture(String);

    impl uWrite for Capture {
        type Error = Infallible;

        fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
            self.0.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn test_hex_bytes() {
        let mut out = Capture(String::new());
        ufmt::uwrite!(&mut out, "{}", HexBytes(&[0x00, 0x5a, 0xff])).unwrap();
        assert_eq!(out.0, "005AFF");
    }
}
