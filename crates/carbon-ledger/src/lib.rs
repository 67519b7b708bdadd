// crates/carbon-ledger/src/lib.rs
//
// carbon-ledger: EVM ledger access for the carbon credit minter.
//
// Speaks Ethereum JSON-RPC over HTTP, encodes the token contract's ABI,
// and builds and signs EIP-155 legacy transactions with a locally held
// secp256k1 key. `ContractLedger` implements carbon-core's `MintLedger`.

pub mod abi;
pub mod contract;
pub mod rlp;
pub mod rpc;
pub mod tx;
pub mod wallet;

pub use contract::{ContractLedger, TokenContract, TokenInfo, DEFAULT_GAS_BUFFER};
pub use rpc::{JsonRpcClient, RpcError};
pub use wallet::LocalSigner;
