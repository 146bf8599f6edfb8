use anyhow::{Result, bail};
use tf_wallet_core::features::parse_slippage;

pub(crate) const HELP: &str = "\
Commands:
  tabs                                  list tabs
  open <tab>                            switch tab
  refresh                               poll balances now
  show | hide                           resume or pause background polling
  balance <token>                       balance of one token
  history                               recent transactions
  import <address> | remove <address>   manage custom tokens
  send <token> <to> <amount> [memo]     transfer, memo up to 32 bytes
  quote <in> <out> <amount>             preview a swap
  swap <in> <out> <amount> [0.5|1|2]    swap on the stablecoin DEX, slippage in % (default 1)
  mint <token> <amount> [recipient]     mint, granting the issuer role if needed
  deploy random | deploy <name> <SYMBOL>
  faucet                                claim testnet funds
  quit";

/// One line of shell input. Tokens are symbols or addresses, resolved later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    Tabs,
    Open(String),
    Refresh,
    Show,
    Hide,
    Balance(String),
    History,
    Import(String),
    Remove(String),
    Send {
        token: String,
        to: String,
        amount: String,
        memo: String,
    },
    Quote {
        token_in: String,
        token_out: String,
        amount: String,
    },
    Swap {
        token_in: String,
        token_out: String,
        amount: String,
        slippage_bps: Option<u32>,
    },
    Mint {
        token: String,
        amount: String,
        recipient: Option<String>,
    },
    Deploy {
        random: bool,
        name: String,
        symbol: String,
    },
    Faucet,
    Quit,
}

impl Command {
    /// Tab the command acts on, so it can be brought forward first.
    pub(crate) fn tab(&self) -> Option<&'static str> {
        match self {
            Self::Balance(_) | Self::Send { .. } => Some("send"),
            Self::Quote { .. } | Self::Swap { .. } => Some("swap"),
            Self::Mint { .. } => Some("mint"),
            Self::Deploy { .. } => Some("create"),
            Self::Faucet => Some("faucet"),
            Self::Import(_) | Self::Remove(_) | Self::History => Some("dashboard"),
            _ => None,
        }
    }
}

/// What follows the first `count` words of `line`, inner whitespace intact.
fn rest_after(line: &str, count: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..count {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest
}

/// `Ok(None)` for a blank line.
pub(crate) fn parse(line: &str) -> Result<Option<Command>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((head, rest)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (head.to_ascii_lowercase().as_str(), rest) {
        ("help" | "?", _) => Command::Help,
        ("tabs", []) => Command::Tabs,
        ("open", [tab]) => Command::Open((*tab).to_owned()),
        ("refresh", []) => Command::Refresh,
        ("show", []) => Command::Show,
        ("hide", []) => Command::Hide,
        ("balance", [token]) => Command::Balance((*token).to_owned()),
        ("history", []) => Command::History,
        ("import", [address]) => Command::Import((*address).to_owned()),
        ("remove", [address]) => Command::Remove((*address).to_owned()),
        ("send", [token, to, amount, ..]) => Command::Send {
            token: (*token).to_owned(),
            to: (*to).to_owned(),
            amount: (*amount).to_owned(),
            memo: rest_after(line, 4).to_owned(),
        },
        ("quote", [token_in, token_out, amount]) => Command::Quote {
            token_in: (*token_in).to_owned(),
            token_out: (*token_out).to_owned(),
            amount: (*amount).to_owned(),
        },
        ("swap", [token_in, token_out, amount]) => Command::Swap {
            token_in: (*token_in).to_owned(),
            token_out: (*token_out).to_owned(),
            amount: (*amount).to_owned(),
            slippage_bps: None,
        },
        ("swap", [token_in, token_out, amount, slippage]) => Command::Swap {
            token_in: (*token_in).to_owned(),
            token_out: (*token_out).to_owned(),
            amount: (*amount).to_owned(),
            slippage_bps: Some(parse_slippage(slippage)?),
        },
        ("mint", [token, amount]) => Command::Mint {
            token: (*token).to_owned(),
            amount: (*amount).to_owned(),
            recipient: None,
        },
        ("mint", [token, amount, recipient]) => Command::Mint {
            token: (*token).to_owned(),
            amount: (*amount).to_owned(),
            recipient: Some((*recipient).to_owned()),
        },
        ("deploy", ["random"]) => Command::Deploy {
            random: true,
            name: String::new(),
            symbol: String::new(),
        },
        ("deploy", [name @ .., symbol]) if !name.is_empty() => Command::Deploy {
            random: false,
            name: name.join(" "),
            symbol: (*symbol).to_owned(),
        },
        ("faucet", []) => Command::Faucet,
        ("quit" | "exit" | "lock", []) => Command::Quit,
        (other, _) => bail!("unrecognised command `{other}`, try `help`"),
    };
    Ok(Some(command))
}
