use std::env::Args;
use std::net::SocketAddr;

use anyhow::{bail, Context as _, Result};

use crate::io::reader::MAX_LINE_LEN;

fn listen_socket_addr(port: &impl std::fmt::Display) -> Result<SocketAddr> {
    format!("0.0.0.0:{port}")
        .parse()
        .with_context(|| format!("failed to parse listen socket address: '0.0.0.0:{port}'"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub(crate) addr: SocketAddr,
    pub(crate) max_line_len: usize,
}

impl Config {
    #[inline]
    pub fn from_args() -> Result<Self> {
        std::env::args().try_into()
    }

    #[inline]
    pub fn listen_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Longest accepted request or header line, excluding the line terminator.
    #[inline]
    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter().skip(1);

        let mut cfg = Self::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--port" | "-p" => {
                    let Some(port) = args.next() else {
                        bail!("missing argument value for --port");
                    };

                    let Ok(port) = port.parse::<u16>() else {
                        bail!("invalid argument value for --port: '{port}'");
                    };

                    cfg.addr = listen_socket_addr(&port)?;
                }

                "--max-line-length" => {
                    let Some(len) = args.next() else {
                        bail!("missing argument value for --max-line-length");
                    };

                    let Ok(len) = len.parse::<usize>() else {
                        bail!("invalid argument value for --max-line-length: '{len}'");
                    };

                    cfg.max_line_len = len;
                }

                _ => continue,
            }
        }

        Ok(cfg)
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 4221)),
            max_line_len: MAX_LINE_LEN,
        }
    }
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    #[inline]
    fn try_from(args: Args) -> Result<Self> {
        Self::parse(args)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(args: &[&str]) -> Vec<String> {
        std::iter::once("http-framer")
            .chain(args.iter().copied())
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn defaults() {
        let cfg = Config::parse(args(&[])).expect("default config");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.listen_addr().port(), 4221);
        assert_eq!(cfg.max_line_len(), MAX_LINE_LEN);
    }

    #[test]
    fn overrides() {
        let cfg = Config::parse(args(&["-p", "8080", "--verbose", "--max-line-length", "256"]))
            .expect("valid config");
        assert_eq!(cfg.listen_addr(), SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(cfg.max_line_len(), 256);
    }

    #[test]
    fn invalid_values() {
        assert!(Config::parse(args(&["--port"])).is_err());
        assert!(Config::parse(args(&["--port", "http"])).is_err());
        assert!(Config::parse(args(&["--max-line-length", "-1"])).is_err());
    }
}
