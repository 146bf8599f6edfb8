use anyhow::Result;
use tf_crypto::WalletKey;
use tf_wallet_core::AccountManager;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, Lines};

const RESET_CONFIRMATION: &str = "DELETE";

/// Line-based questions over any buffered reader; stdin in the binary.
pub(crate) struct Prompt<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> Prompt<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// `Ok(None)` once input is closed.
    pub(crate) async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        let mut out = tokio::io::stdout();
        out.write_all(question.as_bytes()).await?;
        out.flush().await?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_owned()))
    }

    /// Hands the reader on, keeping anything already buffered.
    pub(crate) fn into_reader(self) -> R {
        self.lines.into_inner()
    }
}

/// Runs the unlock screen until a key is available or input ends.
pub(crate) async fn authenticate<R>(
    accounts: &AccountManager,
    prompt: &mut Prompt<R>,
) -> Result<Option<WalletKey>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        if accounts.has_wallet()? {
            let Some(answer) = prompt.ask("Password (or `reset`): ").await? else {
                return Ok(None);
            };
            if answer == "reset" {
                confirm_reset(accounts, prompt).await?;
                continue;
            }
            match accounts.unlock(&answer) {
                Ok(key) => return Ok(Some(key)),
                Err(err) => println!("Unlock failed: {err}"),
            }
            continue;
        }

        let Some(choice) = prompt.ask("No wallet found. [c]reate or [i]mport? ").await? else {
            return Ok(None);
        };
        let created = match choice.to_ascii_lowercase().as_str() {
            "c" | "create" => {
                let Some(password) = new_password(prompt).await? else {
                    continue;
                };
                accounts.create_wallet(&password)
            }
            "i" | "import" => {
                let Some(private_key) = prompt.ask("Private key (hex): ").await? else {
                    return Ok(None);
                };
                let Some(password) = new_password(prompt).await? else {
                    continue;
                };
                accounts.import_wallet(&private_key, &password)
            }
            _ => {
                println!("Please answer `create` or `import`.");
                continue;
            }
        };
        match created {
            Ok(address) => println!("Wallet ready: {address}"),
            Err(err) => println!("Could not store wallet: {err}"),
        }
    }
}

async fn new_password<R: AsyncBufRead + Unpin>(prompt: &mut Prompt<R>) -> Result<Option<String>> {
    let Some(first) = prompt.ask("New password: ").await? else {
        return Ok(None);
    };
    let Some(second) = prompt.ask("Repeat password: ").await? else {
        return Ok(None);
    };
    if first != second {
        println!("Passwords do not match.");
        return Ok(None);
    }
    Ok(Some(first))
}

async fn confirm_reset<R: AsyncBufRead + Unpin>(
    accounts: &AccountManager,
    prompt: &mut Prompt<R>,
) -> Result<()> {
    println!("This permanently deletes the stored key. Funds are lost without a backup.");
    let question = format!("Type {RESET_CONFIRMATION} to continue: ");
    match prompt.ask(&question).await? {
        Some(answer) if answer == RESET_CONFIRMATION => {
            accounts.reset()?;
            println!("Wallet removed.");
        }
        _ => println!("Reset cancelled."),
    }
    Ok(())
}
