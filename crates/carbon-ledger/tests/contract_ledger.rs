// crates/carbon-ledger/tests/contract_ledger.rs
//
// ContractLedger against a scripted JSON-RPC node on a local TcpListener.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use num_bigint::BigUint;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use carbon_core::crypto::{keccak256, to_hex_prefixed};
use carbon_core::mint::{MintRequest, ReceiptStatus};
use carbon_core::traits::{MintLedger, SignedMint};
use carbon_core::{Address, CarbonError};
use carbon_ledger::abi;
use carbon_ledger::{ContractLedger, JsonRpcClient, LocalSigner, TokenContract};

const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

type Handler = Arc<dyn Fn(&str, &Value) -> Value + Send + Sync>;
type CallLog = Arc<Mutex<Vec<(String, Value)>>>;

// ---------------------------------------------------------------------------
// Mock node
// ---------------------------------------------------------------------------

/// Read one HTTP request and return its body.
async fn read_body(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
            let len = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let start = pos + 4;
            while buf.len() < start + len {
                let n = stream.read(&mut chunk).await.ok()?;
                if n == 0 {
                    return None;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            return Some(buf[start..start + len].to_vec());
        }
    }
}

/// Start a node that answers every request with `handler(method, params)`,
/// which returns either `{"result": ..}` or `{"error": ..}`.
async fn mock_node(handler: Handler) -> (String, CallLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let log = calls.clone();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let handler = handler.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Some(body) = read_body(&mut stream).await else {
                    return;
                };
                let request: Value = serde_json::from_slice(&body).unwrap();
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let params = request["params"].clone();
                log.lock().unwrap().push((method.clone(), params.clone()));

                let mut reply = handler(&method, &params);
                reply["jsonrpc"] = json!("2.0");
                reply["id"] = request["id"].clone();
                let text = reply.to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    text.len(),
                    text
                );
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });

    (endpoint, calls)
}

fn methods(calls: &CallLog) -> Vec<String> {
    calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
}

fn token(endpoint: &str) -> TokenContract {
    let rpc = JsonRpcClient::new(endpoint, Duration::from_secs(5)).unwrap();
    TokenContract::new(rpc, CONTRACT.parse().unwrap())
}

fn ledger(endpoint: &str, chain_id: Option<u64>) -> ContractLedger {
    let signer = LocalSigner::from_hex(OWNER_KEY).unwrap();
    ContractLedger::new(token(endpoint), signer, chain_id, 30_000)
}

fn request(recipient: &str) -> MintRequest {
    MintRequest {
        recipient: recipient.parse().unwrap(),
        amount_base_units: BigUint::from(43u32) * BigUint::from(10u32).pow(18),
        system_identifier: "AC:XX0001".to_string(),
        whole_units: BigUint::from(43u32),
        decimals: 18,
    }
}

fn word(value: u64) -> String {
    format!("{:064x}", value)
}

fn abi_string(value: &str) -> String {
    let mut padded = value.as_bytes().to_vec();
    padded.resize(value.len().div_ceil(32) * 32, 0);
    format!("{}{}{}", word(32), word(value.len() as u64), hex::encode(padded))
}

// ===========================================================================
// Reads
// ===========================================================================

#[tokio::test]
async fn token_info_reads_metadata() {
    let handler: Handler = Arc::new(|method, params| {
        assert_eq!(method, "eth_call");
        let data = params[0]["data"].as_str().unwrap().to_string();
        let result = match &data[2..10] {
            "06fdde03" => abi_string("Carbon Credit"),
            "95d89b41" => abi_string("CCT"),
            "313ce567" => word(18),
            "18160ddd" => word(1_000),
            other => panic!("unexpected selector {}", other),
        };
        json!({ "result": format!("0x{}", result) })
    });
    let (endpoint, calls) = mock_node(handler).await;

    let info = token(&endpoint).info().await.unwrap();
    assert_eq!(info.name, "Carbon Credit");
    assert_eq!(info.symbol, "CCT");
    assert_eq!(info.decimals, 18);
    assert_eq!(info.total_supply, BigUint::from(1_000u32));
    assert_eq!(methods(&calls).len(), 4);
}

#[tokio::test]
async fn balance_of_encodes_account() {
    let handler: Handler = Arc::new(|_, params| {
        let data = params[0]["data"].as_str().unwrap();
        assert!(data.starts_with("0x70a08231"));
        assert!(data.to_ascii_lowercase().ends_with("70997970c51812dc3a010c7d01b50e0d17dc79c8"));
        json!({ "result": format!("0x{}", word(5)) })
    });
    let (endpoint, _calls) = mock_node(handler).await;

    let account: Address = RECIPIENT.parse().unwrap();
    assert_eq!(token(&endpoint).balance_of(&account).await.unwrap(), BigUint::from(5u32));
}

#[tokio::test]
async fn receipt_statuses() {
    let handler: Handler = Arc::new(|_, params| match params[0].as_str().unwrap() {
        "0x01" => json!({ "result": { "transactionHash": "0x01", "blockNumber": "0x10", "status": "0x1" } }),
        "0x02" => json!({ "result": { "transactionHash": "0x02", "blockNumber": "0x11", "status": "0x0" } }),
        _ => json!({ "result": null }),
    });
    let (endpoint, _calls) = mock_node(handler).await;
    let token = token(&endpoint);

    let ok = token.receipt("0x01").await.unwrap().unwrap();
    assert_eq!(ok.block_number, 16);
    assert_eq!(ok.status, ReceiptStatus::Confirmed);

    let failed = token.receipt("0x02").await.unwrap().unwrap();
    assert_eq!(failed.status, ReceiptStatus::Failed);

    assert!(token.receipt("0x03").await.unwrap().is_none());
}

#[tokio::test]
async fn mint_events_filters_by_recipient_and_skips_removed() {
    let recipient: Address = RECIPIENT.parse().unwrap();
    let topic0 = to_hex_prefixed(&abi::minted_topic());
    let topic1 = to_hex_prefixed(&recipient.to_word());
    let amount = BigUint::from(43u32) * BigUint::from(10u32).pow(18);
    let mut data = hex::encode(abi::uint_word(&amount).unwrap());
    data.push_str(&word(64));
    data.push_str(&abi_string("AC:XX0001")[64..]);

    let (t0, t1, d) = (topic0.clone(), topic1.clone(), format!("0x{}", data));
    let handler: Handler = Arc::new(move |method, params| {
        assert_eq!(method, "eth_getLogs");
        assert_eq!(params[0]["fromBlock"], "0x64");
        assert_eq!(params[0]["topics"][0], t0.as_str());
        assert_eq!(params[0]["topics"][1], t1.as_str());
        json!({ "result": [
            { "transactionHash": "0xaa", "blockNumber": "0x65", "topics": [t0, t1], "data": d, "removed": false },
            { "transactionHash": "0xbb", "blockNumber": "0x66", "topics": [t0, t1], "data": d, "removed": true },
        ] })
    });
    let (endpoint, _calls) = mock_node(handler).await;

    let events = token(&endpoint).mint_events(&recipient, 100).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].transaction_hash, "0xaa");
    assert_eq!(events[0].block_number, 101);
    assert_eq!(events[0].account, recipient);
    assert_eq!(events[0].amount, amount);
    assert_eq!(events[0].system_identifier, "AC:XX0001");
    assert!(events[0].matches(&request(RECIPIENT)));
}

// ===========================================================================
// Signing and broadcast
// ===========================================================================

fn happy_node() -> Handler {
    Arc::new(|method, params| match method {
        "eth_estimateGas" => json!({ "result": "0x186a0" }),
        "eth_getTransactionCount" => {
            assert_eq!(params[1], "pending");
            json!({ "result": "0x7" })
        }
        "eth_gasPrice" => json!({ "result": "0x3b9aca00" }),
        "eth_chainId" => json!({ "result": "0x7a69" }),
        "eth_sendRawTransaction" => {
            let raw = hex::decode(&params[0].as_str().unwrap()[2..]).unwrap();
            json!({ "result": to_hex_prefixed(&keccak256(&raw)) })
        }
        other => panic!("unexpected method {}", other),
    })
}

#[tokio::test]
async fn sign_then_broadcast_mint() {
    let (endpoint, calls) = mock_node(happy_node()).await;
    let ledger = ledger(&endpoint, None);

    assert_eq!(
        ledger.signer_address().to_string(),
        "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
    );

    let signed = ledger.sign_mint(&request(RECIPIENT)).await.unwrap();
    assert_eq!(signed.nonce, 7);
    assert_eq!(signed.gas_limit, 130_000);
    assert_eq!(signed.transaction_hash, to_hex_prefixed(&keccak256(&signed.raw)));
    assert!(!methods(&calls).contains(&"eth_sendRawTransaction".to_string()));

    let hash = ledger.broadcast(&signed).await.unwrap();
    assert_eq!(hash, signed.transaction_hash);

    let sent = calls
        .lock()
        .unwrap()
        .iter()
        .find(|(m, _)| m == "eth_sendRawTransaction")
        .map(|(_, p)| p[0].as_str().unwrap().to_string())
        .unwrap();
    assert_eq!(sent, to_hex_prefixed(&signed.raw));
}

#[tokio::test]
async fn pinned_chain_id_skips_lookup() {
    let (endpoint, calls) = mock_node(happy_node()).await;
    let ledger = ledger(&endpoint, Some(31337));
    ledger.sign_mint(&request(RECIPIENT)).await.unwrap();
    assert!(!methods(&calls).contains(&"eth_chainId".to_string()));
}

#[tokio::test]
async fn zero_recipient_is_rejected_before_any_call() {
    let (endpoint, calls) = mock_node(happy_node()).await;
    let ledger = ledger(&endpoint, None);
    let zero = format!("{}", Address::ZERO);

    let err = ledger.sign_mint(&request(&zero)).await.unwrap_err();
    assert!(matches!(err, CarbonError::InvalidAddress(_)));
    assert!(methods(&calls).is_empty());
}

#[tokio::test]
async fn estimate_failure_is_submission_rejected() {
    let handler: Handler = Arc::new(|method, _| match method {
        "eth_estimateGas" => json!({ "error": { "code": 3, "message": "execution reverted: Ownable: caller is not the owner" } }),
        other => panic!("unexpected method {}", other),
    });
    let (endpoint, _calls) = mock_node(handler).await;

    let err = ledger(&endpoint, Some(1)).sign_mint(&request(RECIPIENT)).await.unwrap_err();
    match err {
        CarbonError::SubmissionRejected(msg) => assert!(msg.contains("not the owner")),
        other => panic!("Expected SubmissionRejected, got: {:?}", other),
    }
}

fn dummy_signed() -> SignedMint {
    SignedMint {
        transaction_hash: format!("0x{}", "ab".repeat(32)),
        raw: vec![0xc0],
        nonce: 0,
        gas_limit: 21_000,
    }
}

#[tokio::test]
async fn node_refusal_is_submission_rejected() {
    let handler: Handler =
        Arc::new(|_, _| json!({ "error": { "code": -32000, "message": "nonce too low" } }));
    let (endpoint, _calls) = mock_node(handler).await;

    let err = ledger(&endpoint, Some(1)).broadcast(&dummy_signed()).await.unwrap_err();
    assert!(matches!(err, CarbonError::SubmissionRejected(_)));
    assert!(err.releases_reservation());
}

#[tokio::test]
async fn already_known_counts_as_broadcast() {
    let handler: Handler =
        Arc::new(|_, _| json!({ "error": { "code": -32000, "message": "already known" } }));
    let (endpoint, _calls) = mock_node(handler).await;

    let signed = dummy_signed();
    let hash = ledger(&endpoint, Some(1)).broadcast(&signed).await.unwrap();
    assert_eq!(hash, signed.transaction_hash);
}

#[tokio::test]
async fn transport_failure_is_broadcast_uncertain() {
    let ledger = ledger("http://127.0.0.1:1", Some(1)); // Nothing listening
    let signed = dummy_signed();

    match ledger.broadcast(&signed).await.unwrap_err() {
        CarbonError::BroadcastUncertain { tx_hash, .. } => assert_eq!(tx_hash, signed.transaction_hash),
        other => panic!("Expected BroadcastUncertain, got: {:?}", other),
    }
}
