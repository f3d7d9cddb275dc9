#![feature(test)]

extern crate cuckoofilter;
extern crate test;

use cuckoofilter::{CuckooFilter, DynamicCuckooFilter};
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

fn get_words() -> String {
    let path = Path::new("/usr/share/dict/words");
    let display = path.display();

    let mut file = match File::open(path) {
        Err(why) => panic!("couldn't open {}: {}", display, why),
        Ok(file) => file,
    };

    let mut contents = String::new();
    if let Err(why) = file.read_to_string(&mut contents) {
        panic!("couldn't read {}: {}", display, why);
    }
    contents
}

#[bench]
fn bench_new(b: &mut test::Bencher) {
    b.iter(|| {
        test::black_box(CuckooFilter::new(1 << 10));
    });
}

#[bench]
fn bench_insertion(b: &mut test::Bencher) {
    let contents = get_words();
    let split: Vec<&str> = contents.split('\n').take(1000).collect();
    let mut cf = CuckooFilter::new((split.len() * 2) as u32);

    b.iter(|| {
        for s in &split {
            test::black_box(!cf.contains(s) && cf.insert(s).is_ok());
        }
    });
}

#[bench]
fn bench_contains(b: &mut test::Bencher) {
    let contents = get_words();
    let split: Vec<&str> = contents.split('\n').take(1000).collect();
    let mut cf = CuckooFilter::new((split.len() * 2) as u32);
    for s in &split {
        let _ = cf.insert(s);
    }

    b.iter(|| {
        for s in &split {
            test::black_box(cf.contains(s));
        }
    });
}

#[bench]
fn bench_dcf_growth(b: &mut test::Bencher) {
    b.iter(|| {
        let mut dcf = DynamicCuckooFilter::new(1 << 8);
        for i in 0u64..20_000 {
            test::black_box(dcf.insert(&i).is_ok());
        }
    });
}

#[bench]
fn bench_dcf_compact(b: &mut test::Bencher) {
    let mut dcf = DynamicCuckooFilter::new(1 << 8);
    for i in 0u64..20_000 {
        let _ = dcf.insert(&i);
    }
    for i in 0u64..10_000 {
        dcf.delete(&i);
    }

    b.iter(|| {
        test::black_box(dcf.compact());
    });
}
