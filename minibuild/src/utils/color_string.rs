use crate::utils::IResult;

pub use termcolor::Color;

use std::fmt;
use termcolor::{ColorSpec, WriteColor};


pub trait WriteColorExt: std::io::Write {
    fn set_spec(&mut self, spec: &ColorSpec) -> IResult<()>;

    fn reset_color(&mut self) -> IResult<()>;

    fn set_color(&mut self, color: Color) -> IResult<()> {
        self.set_spec(ColorSpec::new().set_fg(Some(color)))
    }

    fn set_bold(&mut self, color: Option<Color>) -> IResult<()> {
        self.set_spec(ColorSpec::new().set_fg(color).set_bold(true))
    }

    fn write_color<B: AsRef<[u8]>>(&mut self, buf: B, color: Color) -> IResult<()> {
        self.set_color(color)?;
        self.write_all(buf.as_ref())?;
        self.reset_color()
    }

    fn write_bold<B: AsRef<[u8]>>(&mut self, buf: B, color: Option<Color>) -> IResult<()> {
        self.set_bold(color)?;
        self.write_all(buf.as_ref())?;
        self.reset_color()
    }

    fn write_status(&mut self, status: &str, colored: bool) -> IResult<()> {
        let color = match status.chars().next() {
            Some('w') => Color::Yellow,
            Some('e') => Color::Red,
            Some('n') => Color::Cyan,
            _ => Color::White,
        };
        if colored {
            self.write_bold(status, Some(color))?;
            self.write_bold(b":", None)?;
        } else {
            self.write_all(status.as_bytes())?;
            self.write(b":")?;
        }
        Ok(())
    }

    /// Prints out a message with a status. The status comes first, and is bold plus the given
    /// color. The status will be justified, where the max width that will right align is 12 chars.
    fn write_status_justified(
        &mut self,
        status: &dyn fmt::Display,
        msg: Option<&dyn fmt::Display>,
        color: Color,
    ) -> IResult<()> {
        self.reset_color()?;
        self.set_spec(ColorSpec::new().set_bold(true).set_fg(Some(color)))?;
        write!(self, "{:>12}", status)?;
        self.reset_color()?;
        match msg {
            Some(msg) => writeln!(self, " {}", msg)?,
            None => write!(self, " ")?,
        }
        Ok(())
    }
}

impl<T> WriteColorExt for T where T: WriteColor {
    fn set_spec(&mut self, spec: &ColorSpec) -> IResult<()> {
        self.set_color(spec)?;
        Ok(())
    }
    fn reset_color(&mut self) -> IResult<()> {
        self.reset()?;
        Ok(())
    }
}
