use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
            EnumString, AsRefStr, Display,
        )]
        #[serde(rename_all = "snake_case")]
        #[strum(serialize_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }
    };
}

vocabulary!(CustomerType { Regular, Premium, Minimum });

vocabulary!(
    /// `Paid` is never set by hand; it follows from the recorded payments.
    InvoiceStatus { Draft, Sent, Paid, Overdue, Cancelled }
);

vocabulary!(
    /// How money reached us for an invoice, as opposed to how an order is settled.
    LedgerPaymentMethod { Cash, CreditCard, BankTransfer, Cheque, Online }
);

vocabulary!(LeadSource { Website, Referral, SocialMedia, Campaign, Other });

vocabulary!(LeadStatus {
    New,
    Contacted,
    Qualified,
    ProposalSent,
    Negotiation,
    Won,
    Lost,
});

vocabulary!(EnquiryType { Product, Service, Partnership, Support, Other });

vocabulary!(EnquiryStatus { New, Contacted, Qualified, Converted, Rejected });
