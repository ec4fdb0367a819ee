pub mod poll_proposals;
