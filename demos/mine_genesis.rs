// Mine a genesis block at difficulty 1 and print its nonce
//
// The difficulty-1 target needs about 2^32 hashes on average. Pass a hex
// max target as the first argument to mine against an easier network.

use num_bigint::BigUint;
use pow_ledger::{Block, Miner, MiningOutcome, ParallelMiner};

fn main() {
    env_logger::init();
    println!("Mining genesis block...\n");

    let mut genesis = match Block::genesis(1_700_000_000, "1") {
        Ok(block) => block,
        Err(e) => {
            eprintln!("Invalid genesis block: {}", e);
            std::process::exit(1);
        }
    };

    let mut miner = Miner::new();
    if let Some(max) = std::env::args().nth(1) {
        match BigUint::parse_bytes(max.as_bytes(), 16) {
            Some(max) => miner = miner.with_max_target(max),
            None => {
                eprintln!("Invalid max target: {}", max);
                std::process::exit(1);
            }
        }
    }

    match ParallelMiner::with_available_parallelism(miner).mine(&mut genesis) {
        Ok(MiningOutcome::Found(result)) => {
            println!("✓ Genesis block mined successfully!\n");
            println!("Nonce: {}", result.nonce);
            println!("Hash: {}", result.hash);
            println!("Attempts: {}", result.attempts);
            println!("Duration: {:?}", result.duration);
            println!("Hash rate: {:.2} H/s", result.hash_rate());
        }
        Ok(outcome) => println!("✗ Mining stopped: {:?}", outcome),
        Err(e) => println!("✗ Mining failed: {}", e),
    }
}
