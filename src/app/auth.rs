use crate::foundation::error::{MemoraError, MemoraResult};

/// Number of one-time-code slots.
pub const CODE_LEN: usize = 6;

/// Where the sign-in modal currently is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthStep {
    EmailEntry,
    CodeEntry {
        email: String,
        digits: [Option<char>; CODE_LEN],
    },
}

/// Result of filling a code slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthProgress {
    Pending,
    /// Every slot is filled; sign-in succeeds for `email`.
    Complete {
        email: String,
    },
}

/// Email then one-time-code modal flow.
///
/// Nothing is sent and the code is never checked: any six digits complete the flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthFlow {
    step: AuthStep,
}

impl Default for AuthFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthFlow {
    pub fn new() -> Self {
        Self {
            step: AuthStep::EmailEntry,
        }
    }

    pub fn step(&self) -> &AuthStep {
        &self.step
    }

    /// Move from email entry to code entry.
    pub fn submit_email(&mut self, email: &str) -> MemoraResult<()> {
        if !matches!(self.step, AuthStep::EmailEntry) {
            return Err(MemoraError::InvalidTransition {
                from: "CodeEntry",
                trigger: "submit_email",
            });
        }
        let email = email.trim();
        if email.is_empty() {
            return Err(MemoraError::validation("email must not be empty"));
        }
        if !email.contains('@') {
            return Err(MemoraError::validation(format!(
                "'{email}' is not an email address"
            )));
        }
        self.step = AuthStep::CodeEntry {
            email: email.to_string(),
            digits: [None; CODE_LEN],
        };
        Ok(())
    }

    /// Set (`Some`) or clear (`None`) one code slot.
    pub fn enter_digit(&mut self, index: usize, value: Option<char>) -> MemoraResult<AuthProgress> {
        let AuthStep::CodeEntry { email, digits } = &mut self.step else {
            return Err(MemoraError::InvalidTransition {
                from: "EmailEntry",
                trigger: "enter_digit",
            });
        };
        if index >= CODE_LEN {
            return Err(MemoraError::validation(format!(
                "code slot {index} out of range (0..{CODE_LEN})"
            )));
        }
        if let Some(ch) = value
            && !ch.is_ascii_digit()
        {
            return Err(MemoraError::validation(format!("'{ch}' is not a digit")));
        }

        digits[index] = value;
        if digits.iter().all(Option::is_some) {
            Ok(AuthProgress::Complete {
                email: email.clone(),
            })
        } else {
            Ok(AuthProgress::Pending)
        }
    }

    /// Fill slots left to right from the first six characters of `code`.
    ///
    /// The whole prefix is checked before any slot changes, so a rejected code leaves the
    /// flow as it was.
    pub fn enter_code(&mut self, code: &str) -> MemoraResult<AuthProgress> {
        if !matches!(self.step, AuthStep::CodeEntry { .. }) {
            return Err(MemoraError::InvalidTransition {
                from: "EmailEntry",
                trigger: "enter_code",
            });
        }
        let chars: Vec<char> = code.trim().chars().take(CODE_LEN).collect();
        if let Some(ch) = chars.iter().find(|ch| !ch.is_ascii_digit()) {
            return Err(MemoraError::validation(format!("'{ch}' is not a digit")));
        }

        let mut progress = AuthProgress::Pending;
        for (i, ch) in chars.into_iter().enumerate() {
            progress = self.enter_digit(i, Some(ch))?;
        }
        Ok(progress)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/app/auth.rs"]
mod tests;
