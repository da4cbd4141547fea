use derive_more::Display;

/// Standard SQL transaction isolation levels, ordered from weakest to
/// strongest.
///
/// The `Display` form is the SQL spelling accepted by
/// `SET TRANSACTION ISOLATION LEVEL`.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum IsolationLevel {
    /// Reads may observe writes of transactions that have not committed.
    #[display("READ UNCOMMITTED")]
    ReadUncommitted,
    /// Each read observes only committed data, but two reads of the same row
    /// may differ if another transaction commits in between.
    #[display("READ COMMITTED")]
    ReadCommitted,
    /// Every read in a transaction observes the same snapshot.
    #[display("REPEATABLE READ")]
    RepeatableRead,
    /// Equivalent to some serial execution of all transactions.
    #[display("SERIALIZABLE")]
    Serializable,
}

impl IsolationLevel {
    pub const ALL: [Self; 4] = [
        Self::ReadUncommitted,
        Self::ReadCommitted,
        Self::RepeatableRead,
        Self::Serializable,
    ];

    /// Statement that sets the isolation level of the next transaction on a
    /// connection.
    #[must_use]
    pub fn set_transaction_sql(self) -> String {
        format!("SET TRANSACTION ISOLATION LEVEL {self}")
    }

    /// Whether a transaction at this level may observe uncommitted writes.
    #[must_use]
    pub const fn allows_dirty_reads(self) -> bool {
        matches!(self, Self::ReadUncommitted)
    }

    /// Whether two reads of the same row inside one transaction at this level
    /// may return different committed values.
    #[must_use]
    pub const fn allows_non_repeatable_reads(self) -> bool {
        matches!(self, Self::ReadUncommitted | Self::ReadCommitted)
    }
}
