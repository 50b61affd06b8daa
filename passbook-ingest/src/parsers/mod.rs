pub mod running_balance;
